//! Anti-automation profile handed to the browser for each page session

use crate::infrastructure::config::StealthConfig;

/// Hides the most common automation fingerprints before any page script runs
const EVASION_SCRIPT_TEMPLATE: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => __LANGUAGES__ });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
    window.navigator.permissions.query = (parameters) =>
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters);
}
"#;

/// Per-session browser settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealthProfile {
    pub user_agent: String,
    /// Script injected on every new document, if enabled
    pub evasion_script: Option<String>,
    /// Chrome command-line flags
    pub launch_args: Vec<String>,
    pub window_size: (u32, u32),
    pub locale: String,
}

impl StealthProfile {
    /// Build a profile with a randomly picked user agent
    pub fn random(config: &StealthConfig) -> Self {
        let user_agent = if config.user_agents.is_empty() {
            String::new()
        } else {
            config.user_agents[fastrand::usize(..config.user_agents.len())].clone()
        };
        Self::with_user_agent(config, user_agent)
    }

    pub fn with_user_agent(config: &StealthConfig, user_agent: String) -> Self {
        let mut launch_args = config.extra_args.clone();
        launch_args.push(format!("--lang={}", config.locale));

        Self {
            user_agent,
            evasion_script: config
                .evasion_script_enabled
                .then(|| evasion_script(&config.locale)),
            launch_args,
            window_size: (config.window_width, config.window_height),
            locale: config.locale.clone(),
        }
    }
}

fn evasion_script(locale: &str) -> String {
    let primary = locale.split('-').next().unwrap_or(locale);
    let languages = if primary == locale {
        format!("['{locale}']")
    } else {
        format!("['{locale}', '{primary}']")
    };
    EVASION_SCRIPT_TEMPLATE.replace("__LANGUAGES__", &languages)
}
