use crate::error::{Error, RemoteError, StorageError, ValidationError, ViewerError};
use rust_embed::RustEmbed;
use serde::Deserialize;
use std::ops::Deref;
use std::sync::OnceLock;

#[derive(RustEmbed)]
#[folder = "./assets/i18n"]
struct Locales;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Language {
    ZhCn,
    EnUs,
}

impl Language {
    pub fn detect() -> Self {
        if let Some(locale_tag) = sys_locale::get_locale() {
            return Self::from_locale_tag(&locale_tag);
        }

        Self::EnUs
    }

    pub fn from_locale_tag(raw: &str) -> Self {
        let tag = raw.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Self::EnUs;
        }

        let is_chinese = tag.starts_with("zh")
            || tag == "cn"
            || tag.starts_with("cn_")
            || tag.starts_with("cn-")
            || tag.contains("_zh")
            || tag.contains("-zh");
        if is_chinese {
            return Self::ZhCn;
        }

        Self::EnUs
    }

    fn file_name(self) -> &'static str {
        match self {
            Self::ZhCn => "zh_CN.json",
            Self::EnUs => "en_US.json",
        }
    }
}

macro_rules! locale_message_fields {
    ($macro:ident) => {
        $macro! {
            all_categories,
            only_pdf_files,
            not_a_pdf,
            empty_name,
            file_not_found,
            category_not_found,
            reserved_category,
            load_failed,
            store_unavailable,
            save_files_failed,
            save_categories_failed,
            clear_files_failed,
            payload_unreadable,
            export_failed,
            viewer_unavailable,
            export_hint,
            viewer_not_open,
            open_failed,
            render_failed,
            remote_not_configured,
            upload_failed,
            upload_success,
            page_indicator,
            file_count,
            no_files,
        }
    };
}

macro_rules! define_raw_locale_messages {
    ($($field:ident),+ $(,)?) => {
        #[derive(Debug, Deserialize)]
        struct RawLocaleMessages {
            $(
                $field: String,
            )+
        }
    };
}

macro_rules! define_locale_messages {
    ($($field:ident),+ $(,)?) => {
        #[derive(Debug)]
        pub struct LocaleMessages {
            $(
                pub $field: &'static str,
            )+
        }
    };
}

macro_rules! impl_from_raw_locale_messages {
    ($($field:ident),+ $(,)?) => {
        impl From<RawLocaleMessages> for LocaleMessages {
            fn from(raw: RawLocaleMessages) -> Self {
                Self {
                    $(
                        $field: leak_str(raw.$field),
                    )+
                }
            }
        }
    };
}

locale_message_fields!(define_raw_locale_messages);
locale_message_fields!(define_locale_messages);
locale_message_fields!(impl_from_raw_locale_messages);

fn leak_str(value: String) -> &'static str {
    Box::leak(value.into_boxed_str())
}

static ZH_CN_MESSAGES: OnceLock<LocaleMessages> = OnceLock::new();
static EN_US_MESSAGES: OnceLock<LocaleMessages> = OnceLock::new();

#[derive(Clone, Copy, Debug)]
pub struct I18n {
    messages: &'static LocaleMessages,
}

impl I18n {
    pub fn new(lang: Language) -> Self {
        Self {
            messages: messages_for(lang),
        }
    }

    pub fn not_a_pdf(self, file_name: &str) -> String {
        format_template(self.not_a_pdf, &[("name", file_name.to_string())])
    }

    pub fn file_not_found(self, id: &str) -> String {
        format_template(self.file_not_found, &[("id", id.to_string())])
    }

    pub fn category_not_found(self, id: &str) -> String {
        format_template(self.category_not_found, &[("id", id.to_string())])
    }

    pub fn export_hint(self, id: &str) -> String {
        format_template(self.export_hint, &[("id", id.to_string())])
    }

    pub fn render_failed(self, page: usize) -> String {
        format_template(self.render_failed, &[("page", page.to_string())])
    }

    pub fn page_indicator(self, page: usize, total: usize) -> String {
        format_template(
            self.page_indicator,
            &[("page", page.to_string()), ("total", total.to_string())],
        )
    }

    pub fn file_count(self, count: usize) -> String {
        format_template(self.file_count, &[("count", count.to_string())])
    }

    /// User-facing text for an error that has no more specific context message.
    pub fn describe(self, err: &Error) -> String {
        match err {
            Error::Validation(err) => match err {
                ValidationError::NotPdf(name) => self.not_a_pdf(name),
                ValidationError::NoPdfFiles => self.only_pdf_files.to_string(),
                ValidationError::EmptyName => self.empty_name.to_string(),
                ValidationError::FileNotFound(id) => self.file_not_found(id),
                ValidationError::CategoryNotFound(id) => self.category_not_found(id),
                ValidationError::ReservedCategory => self.reserved_category.to_string(),
            },
            Error::Storage(StorageError::Unavailable(_)) => self.store_unavailable.to_string(),
            Error::Storage(_) => self.save_files_failed.to_string(),
            Error::Payload(_) => self.payload_unreadable.to_string(),
            Error::Remote(RemoteError::NotConfigured) => self.remote_not_configured.to_string(),
            Error::Remote(_) => self.upload_failed.to_string(),
            Error::Viewer(err) => match err {
                ViewerError::Unavailable(_) => self.viewer_unavailable.to_string(),
                ViewerError::NotOpen => self.viewer_not_open.to_string(),
                ViewerError::OpenFailed(_) => self.open_failed.to_string(),
                ViewerError::RenderFailed { page, .. } => self.render_failed(*page),
            },
            Error::Io(_) => self.export_failed.to_string(),
        }
    }
}

impl Deref for I18n {
    type Target = LocaleMessages;

    fn deref(&self) -> &Self::Target {
        self.messages
    }
}

fn messages_for(lang: Language) -> &'static LocaleMessages {
    match lang {
        Language::ZhCn => ZH_CN_MESSAGES.get_or_init(|| load_messages(Language::ZhCn)),
        Language::EnUs => EN_US_MESSAGES.get_or_init(|| load_messages(Language::EnUs)),
    }
}

fn load_messages(lang: Language) -> LocaleMessages {
    match try_load_messages(lang) {
        Ok(messages) => messages,
        Err(primary_err) => {
            crate::debug_log!(
                "[i18n] failed to load {}: {}",
                lang.file_name(),
                primary_err
            );

            if lang == Language::EnUs {
                panic!(
                    "failed to load i18n file {}: {}",
                    lang.file_name(),
                    primary_err
                );
            }

            match try_load_messages(Language::EnUs) {
                Ok(messages) => {
                    crate::debug_log!(
                        "[i18n] fallback to {} after {} failed",
                        Language::EnUs.file_name(),
                        lang.file_name()
                    );
                    messages
                }
                Err(fallback_err) => panic!(
                    "failed to load i18n files {} ({}) and {} ({})",
                    lang.file_name(),
                    primary_err,
                    Language::EnUs.file_name(),
                    fallback_err
                ),
            }
        }
    }
}

fn try_load_messages(lang: Language) -> Result<LocaleMessages, String> {
    let file = Locales::get(lang.file_name())
        .ok_or_else(|| format!("{} is not embedded", lang.file_name()))?;

    serde_json::from_slice::<RawLocaleMessages>(&file.data)
        .map(LocaleMessages::from)
        .map_err(|err| format!("{} parse failed: {}", lang.file_name(), err))
}

fn format_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut output = template.to_string();
    for (key, value) in vars {
        let token = format!("{{{key}}}");
        output = output.replace(&token, value);
    }
    output
}
