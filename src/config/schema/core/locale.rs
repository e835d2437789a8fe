use super::Config;

const FALLBACK_LOCALE: &str = "en";

/// `"ja_JP.UTF-8"` -> `"ja"`, `"en-US"` -> `"en"`.
fn language_tag(raw: &str) -> String {
    raw.trim()
        .split(['.', '_', '-'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Pick the first non-empty candidate whose language has a locale file.
fn pick_locale<'a>(
    candidates: impl IntoIterator<Item = Option<&'a str>>,
    available: &[&str],
) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(language_tag)
        .find(|tag| !tag.is_empty() && available.contains(&tag.as_str()))
        .unwrap_or_else(|| FALLBACK_LOCALE.to_string())
}

impl Config {
    /// Resolve `RELAYDESK_LANG` -> config `locale` -> `LANG`, then set the
    /// process locale used for simulator replies. Returns the chosen locale.
    pub fn apply_locale(&self) -> String {
        let env_lang = std::env::var("RELAYDESK_LANG").ok();
        let system_lang = std::env::var("LANG").ok();
        let available = rust_i18n::available_locales!();

        let locale = pick_locale(
            [
                env_lang.as_deref(),
                Some(self.locale.as_str()),
                system_lang.as_deref(),
            ],
            &available,
        );
        rust_i18n::set_locale(&locale);
        locale
    }
}
