//! Payload builders for the WiFi, vCard and URL templates.

use serde::Deserialize;
use serde_json::Value;

use super::error::{ServiceError, ServiceResult};

/// Render fields every template accepts besides its own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateRender {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default = "default_style")]
    pub style: String,
}

fn default_format() -> String {
    "png".to_string()
}

fn default_size() -> u32 {
    256
}

fn default_style() -> String {
    "square".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEncryption {
    Wpa,
    Wpa2,
    Wep,
    NoPass,
}

impl WifiEncryption {
    fn parse(s: &str) -> ServiceResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WPA" => Ok(Self::Wpa),
            "WPA2" => Ok(Self::Wpa2),
            "WEP" => Ok(Self::Wep),
            "NOPASS" => Ok(Self::NoPass),
            _ => Err(ServiceError::validation(
                "INVALID_ENCRYPTION",
                format!("Unknown encryption '{s}'. Available: WPA, WPA2, WEP, nopass"),
            )),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Wpa => "WPA",
            Self::Wpa2 => "WPA2",
            Self::Wep => "WEP",
            Self::NoPass => "nopass",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wifi {
    pub ssid: String,
    pub password: String,
    pub encryption: WifiEncryption,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VCard {
    pub name: String,
    pub org: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlTemplate {
    pub url: String,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Wifi(Wifi),
    VCard(VCard),
    Url(UrlTemplate),
}

impl Template {
    /// Reads the template named `kind` from a JSON field bag.
    pub fn from_fields(kind: &str, fields: &Value) -> ServiceResult<Self> {
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
        let required = |key: &str| {
            text(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ServiceError::validation("MISSING_FIELD", format!("Missing '{key}' field")))
        };

        match kind.trim().to_ascii_lowercase().as_str() {
            "wifi" => Ok(Self::Wifi(Wifi {
                ssid: required("ssid")?,
                password: text("password").unwrap_or_default(),
                encryption: WifiEncryption::parse(&text("encryption").unwrap_or_else(|| "WPA2".into()))?,
                hidden: fields.get("hidden").and_then(Value::as_bool).unwrap_or(false),
            })),
            "vcard" => Ok(Self::VCard(VCard {
                name: required("name")?,
                org: text("org"),
                title: text("title"),
                phone: text("phone"),
                email: text("email"),
                url: text("url"),
            })),
            "url" => Ok(Self::Url(UrlTemplate {
                url: required("url")?,
                utm_source: text("utm_source"),
                utm_medium: text("utm_medium"),
                utm_campaign: text("utm_campaign"),
            })),
            _ => Err(ServiceError::validation(
                "UNKNOWN_TEMPLATE",
                format!("Unknown template type: '{kind}'. Available: wifi, vcard, url"),
            )),
        }
    }

    pub fn payload(&self) -> String {
        match self {
            Self::Wifi(w) => wifi_payload(w),
            Self::VCard(v) => vcard_payload(v),
            Self::Url(u) => url_payload(u),
        }
    }
}

// Backslash escapes the characters with a meaning in the WIFI: grammar
fn escape_wifi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ';' | ',' | ':' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn wifi_payload(w: &Wifi) -> String {
    format!(
        "WIFI:T:{};S:{};P:{};H:{};;",
        w.encryption.as_str(),
        escape_wifi(&w.ssid),
        escape_wifi(&w.password),
        w.hidden
    )
}

pub fn vcard_payload(v: &VCard) -> String {
    let mut card = format!("BEGIN:VCARD\nFN:{}\n", v.name);
    let optional = [("ORG", &v.org), ("TITLE", &v.title), ("TEL", &v.phone), ("EMAIL", &v.email), ("URL", &v.url)];
    for (tag, value) in optional {
        if let Some(value) = value {
            card.push_str(&format!("{tag}:{value}\n"));
        }
    }
    card.push_str("END:VCARD");
    card
}

pub fn url_payload(u: &UrlTemplate) -> String {
    let params: Vec<String> = [("utm_source", &u.utm_source), ("utm_medium", &u.utm_medium), ("utm_campaign", &u.utm_campaign)]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| format!("{key}={}", urlencoding::encode(v))))
        .collect();

    if params.is_empty() {
        return u.url.clone();
    }
    let sep = if u.url.contains('?') { '&' } else { '?' };
    format!("{}{sep}{}", u.url, params.join("&"))
}
