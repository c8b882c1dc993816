//! Two-locale UI string tables with parameter substitution.
//!
//! Lookup never fails: a key missing from the active locale falls back to
//! the English table, and a key missing from both is returned verbatim.

/// Supported UI locales. Exactly two; the toggle flips between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lang {
    #[default]
    En,
    Zh,
}

impl Lang {
    pub fn toggled(self) -> Self {
        match self {
            Lang::En => Lang::Zh,
            Lang::Zh => Lang::En,
        }
    }

    /// Picks the startup locale from the ambient environment, preferring
    /// `LC_ALL` over `LANG`. Only a `zh`-tagged locale selects Chinese;
    /// everything else, including an unset environment, is the English base.
    pub fn from_env() -> Self {
        std::env::var("LC_ALL")
            .or_else(|_| std::env::var("LANG"))
            .map(|tag| Self::from_locale_tag(&tag))
            .unwrap_or_default()
    }

    pub fn from_locale_tag(tag: &str) -> Self {
        if tag.trim().to_ascii_lowercase().starts_with("zh") {
            Lang::Zh
        } else {
            Lang::En
        }
    }
}

const EN_TABLE: &[(&str, &str)] = &[
    ("title", "Your Health Expert"),
    (
        "initial_message",
        "Hello! I am your health expert. Ask me any health-related questions or upload an image of a product to learn about its function and potential hazards.",
    ),
    ("thinking", "Thinking..."),
    ("error_message", "Failed to get response: {errorMessage}"),
    ("chat_error_message", "Sorry, I encountered an error: {errorMessage}"),
    ("input_placeholder", "Type a message or upload an image..."),
    (
        "image_analysis_prompt",
        "Analyze this image. Identify the object, describe its functions, and detail any potential health hazards.",
    ),
    ("lang_toggle", "中文"),
    ("role_user", "You"),
    ("role_model", "Expert"),
    ("image_placeholder", "[image: {mimeType}]"),
    ("commands_hint", "Commands: /image <path> [caption], /lang, /quit"),
];

const ZH_TABLE: &[(&str, &str)] = &[
    ("title", "你的健康专家"),
    (
        "initial_message",
        "你好！我是你的健康专家。你可以问我任何与健康相关的问题，或者上传一张产品图片来了解它的作用和潜在危害。",
    ),
    ("thinking", "正在思考..."),
    ("error_message", "获取回复失败: {errorMessage}"),
    ("chat_error_message", "抱歉，我遇到了一个错误: {errorMessage}"),
    ("input_placeholder", "输入消息或上传图片..."),
    (
        "image_analysis_prompt",
        "分析这张图片。识别图中的物体，描述它的功能，并详细说明任何潜在的健康危害。",
    ),
    ("lang_toggle", "English"),
    ("role_user", "你"),
    ("role_model", "专家"),
    ("image_placeholder", "[图片: {mimeType}]"),
    ("commands_hint", "命令: /image <路径> [说明], /lang, /quit"),
];

fn table_for(lang: Lang) -> &'static [(&'static str, &'static str)] {
    match lang {
        Lang::En => EN_TABLE,
        Lang::Zh => ZH_TABLE,
    }
}

fn lookup(lang: Lang, key: &str) -> Option<&'static str> {
    table_for(lang)
        .iter()
        .find(|(entry_key, _)| *entry_key == key)
        .map(|(_, value)| *value)
}

/// Localizes `key` for `lang` with no parameter substitution.
pub fn translate(lang: Lang, key: &str) -> String {
    translate_with(lang, key, &[])
}

/// Localizes `key` for `lang`, then replaces every `{name}` occurrence for
/// each `(name, value)` pair. Replacement is applied to all occurrences of
/// a placeholder, so a template may repeat one safely.
pub fn translate_with(lang: Lang, key: &str, params: &[(&str, &str)]) -> String {
    let mut text = lookup(lang, key)
        .or_else(|| lookup(Lang::En, key))
        .map(str::to_string)
        .unwrap_or_else(|| key.to_string());

    for (name, value) in params {
        text = text.replace(&format!("{{{name}}}"), value);
    }

    text
}
