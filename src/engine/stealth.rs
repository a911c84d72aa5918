//! Stealth evasions applied to each page before navigation
//!
//! Scripts are registered with `Page.addScriptToEvaluateOnNewDocument`, so
//! they run ahead of any page script on the navigation that follows.
//! Injection is best-effort: individual script failures are logged and only
//! a total failure is reported to the caller.

use anyhow::Result;
use chromiumoxide::{Page, cdp};
use futures::future::join_all;
use log::{debug, warn};

/// Fingerprint values presented to the page
#[derive(Debug, Clone)]
pub struct StealthProfile {
    pub accept_language: String,
    pub platform: String,
    pub languages: Vec<String>,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    pub hardware_concurrency: u32,
}

impl Default for StealthProfile {
    fn default() -> Self {
        Self {
            accept_language: "en-US,en;q=0.9".to_string(),
            platform: "Win32".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
            webgl_vendor: "Intel Inc.".to_string(),
            webgl_renderer: "Intel(R) UHD Graphics".to_string(),
            hardware_concurrency: 8,
        }
    }
}

// Order matters: the config object must exist before the scripts that read it
const NAVIGATOR_WEBDRIVER_JS: &str = r"
    Object.defineProperty(Navigator.prototype, 'webdriver', { get: () => undefined });
";

const NAVIGATOR_LANGUAGES_JS: &str = r"
    Object.defineProperty(Navigator.prototype, 'languages', {
        get: () => window.__relayStealth.languages.slice()
    });
";

const NAVIGATOR_HARDWARE_JS: &str = r"
    Object.defineProperty(Navigator.prototype, 'hardwareConcurrency', {
        get: () => window.__relayStealth.hardwareConcurrency
    });
";

const NAVIGATOR_PLUGINS_JS: &str = r"
    (() => {
        const mockPlugins = [
            { name: 'Chrome PDF Plugin', description: 'Portable Document Format', filename: 'internal-pdf-viewer' },
            { name: 'Chrome PDF Viewer', description: '', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
            { name: 'Native Client', description: '', filename: 'internal-nacl-plugin' }
        ];
        const proto = Object.getPrototypeOf(navigator.plugins);
        Object.defineProperty(Navigator.prototype, 'plugins', {
            get: () => {
                const plugins = {};
                mockPlugins.forEach((plugin, i) => {
                    plugins[i] = plugin;
                    plugins[plugin.name] = plugin;
                });
                Object.setPrototypeOf(plugins, proto);
                Object.defineProperty(plugins, 'length', { value: mockPlugins.length });
                return plugins;
            }
        });
    })();
";

const CHROME_RUNTIME_JS: &str = r"
    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: () => ({
                onMessage: { addListener: () => {}, removeListener: () => {} },
                postMessage: () => {}
            })
        };
    }
";

const WEBGL_VENDOR_JS: &str = r"
    (() => {
        const handler = {
            apply: function(target, ctx, args) {
                const param = (args && args[0]) || null;
                // UNMASKED_VENDOR_WEBGL / UNMASKED_RENDERER_WEBGL
                if (param === 37445) {
                    return window.__relayStealth.webglVendor;
                }
                if (param === 37446) {
                    return window.__relayStealth.webglRenderer;
                }
                return Reflect.apply(target, ctx, args);
            }
        };
        for (const ctor of [window.WebGLRenderingContext, window.WebGL2RenderingContext]) {
            if (ctor) {
                ctor.prototype.getParameter = new Proxy(ctor.prototype.getParameter, handler);
            }
        }
    })();
";

const EVASION_SCRIPTS: &[(&str, &str)] = &[
    ("navigator_webdriver", NAVIGATOR_WEBDRIVER_JS),
    ("navigator_languages", NAVIGATOR_LANGUAGES_JS),
    ("navigator_hardware", NAVIGATOR_HARDWARE_JS),
    ("navigator_plugins", NAVIGATOR_PLUGINS_JS),
    ("chrome_runtime", CHROME_RUNTIME_JS),
    ("webgl_vendor", WEBGL_VENDOR_JS),
];

fn config_script(profile: &StealthProfile) -> String {
    format!(
        r#"
        window.__relayStealth = {{
            languages: {},
            hardwareConcurrency: {},
            webglVendor: {},
            webglRenderer: {}
        }};
        "#,
        serde_json::to_string(&profile.languages).unwrap_or_else(|_| "[]".to_string()),
        profile.hardware_concurrency,
        serde_json::to_string(&profile.webgl_vendor).unwrap_or_else(|_| "\"\"".to_string()),
        serde_json::to_string(&profile.webgl_renderer).unwrap_or_else(|_| "\"\"".to_string()),
    )
}

async fn add_script(page: &Page, source: String) -> Result<()> {
    page.execute(
        cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams {
            source,
            include_command_line_api: None,
            world_name: None,
            run_immediately: None,
        },
    )
    .await?;
    Ok(())
}

/// Register all evasions on `page` and strip "Headless" from its user agent
pub async fn inject(page: &Page, profile: &StealthProfile) -> Result<()> {
    debug!("Injecting stealth config");
    add_script(page, config_script(profile)).await?;

    let results = join_all(EVASION_SCRIPTS.iter().map(|(name, source)| async move {
        (*name, add_script(page, (*source).to_string()).await)
    }))
    .await;

    let mut injected = 0;
    for (name, result) in results {
        match result {
            Ok(()) => injected += 1,
            Err(e) => warn!("Failed to inject stealth script {}: {}", name, e),
        }
    }

    if injected == 0 {
        return Err(anyhow::anyhow!(
            "Failed to inject any of {} stealth scripts",
            EVASION_SCRIPTS.len()
        ));
    }

    let version = page
        .execute(cdp::browser_protocol::browser::GetVersionParams {})
        .await?;
    page.execute(cdp::browser_protocol::network::SetUserAgentOverrideParams {
        user_agent: version.user_agent.replace("Headless", ""),
        accept_language: Some(profile.accept_language.clone()),
        platform: Some(profile.platform.clone()),
        user_agent_metadata: None,
    })
    .await?;

    debug!("Stealth injection complete: {}/{} scripts active", injected, EVASION_SCRIPTS.len());
    Ok(())
}
