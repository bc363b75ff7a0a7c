use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

const WINDOW_SIZE_ARG: &str = "--window-size=1920,1080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Browser {
    #[default]
    Edge,
    Chrome,
    Firefox,
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Browser::Edge => "edge",
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
        };
        f.write_str(name)
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "edge" | "msedge" | "microsoftedge" => Ok(Browser::Edge),
            "chrome" | "chromium" => Ok(Browser::Chrome),
            "firefox" => Ok(Browser::Firefox),
            other => Err(format!("unsupported browser: {other}")),
        }
    }
}

/// New-session payload for `browser`.
pub fn capabilities(browser: Browser, headless: bool) -> Value {
    match browser {
        Browser::Firefox => {
            let mut args = Vec::<&str>::new();
            if headless {
                args.push("-headless");
            }
            args.extend(["-width=1920", "-height=1080"]);
            json!({
                "capabilities": {
                    "alwaysMatch": {
                        "browserName": "firefox",
                        "moz:firefoxOptions": { "args": args }
                    }
                }
            })
        }
        Browser::Edge | Browser::Chrome => {
            let mut args = Vec::<&str>::new();
            if headless {
                args.push("--headless=new");
            }
            args.extend(["--disable-gpu", WINDOW_SIZE_ARG]);
            let (name, options_key) = match browser {
                Browser::Edge => ("MicrosoftEdge", "ms:edgeOptions"),
                _ => ("chrome", "goog:chromeOptions"),
            };
            json!({
                "capabilities": {
                    "alwaysMatch": {
                        "browserName": name,
                        options_key: { "args": args }
                    }
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_headless_payload() {
        let caps = capabilities(Browser::Edge, true);
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["browserName"], "MicrosoftEdge");
        let args = always["ms:edgeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
        assert!(args.iter().any(|a| a == WINDOW_SIZE_ARG));
    }

    #[test]
    fn headed_chrome_has_no_headless_flag() {
        let caps = capabilities(Browser::Chrome, false);
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(!args.iter().any(|a| a.as_str().unwrap().contains("headless")));
    }

    #[test]
    fn browser_names_parse() {
        assert_eq!("MSEdge".parse::<Browser>(), Ok(Browser::Edge));
        assert_eq!("firefox".parse::<Browser>(), Ok(Browser::Firefox));
        assert!("safari".parse::<Browser>().is_err());
        assert_eq!(Browser::Chrome.to_string(), "chrome");
    }
}
