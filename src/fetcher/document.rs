//! Raw schedule document as served by the schedule API
//!
//! The body is a JSON array of items. Some deployments serve that array
//! wrapped in a JSON string, so [`parse_items`] unwraps one level of string
//! encoding. Identifier and geometry fields show up as either strings or
//! numbers and are accepted in both forms.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One raw slot item
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    /// Slot start, hexadecimal seconds since the epoch
    #[serde(default, deserialize_with = "lenient_string")]
    pub ad_time: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub slot_id: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub device_id: String,

    #[serde(rename = "AdvertiserTop", default, deserialize_with = "lenient_string")]
    pub advertiser_top: String,

    #[serde(rename = "AdvertiserBottom", default, deserialize_with = "lenient_string")]
    pub advertiser_bottom: String,

    #[serde(rename = "IMGtop", default, deserialize_with = "lenient_string")]
    pub image_top: String,

    #[serde(rename = "IMGbottom", default, deserialize_with = "lenient_string")]
    pub image_bottom: String,

    #[serde(rename = "IMGtopAnalytics", default, deserialize_with = "lenient_string")]
    pub analytics_top: String,

    #[serde(rename = "IMGbottomAnalytics", default, deserialize_with = "lenient_string")]
    pub analytics_bottom: String,

    // Geometry; only read from the first item
    #[serde(default, deserialize_with = "lenient_u32")]
    pub screen_width: Option<u32>,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub screen_height: Option<u32>,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub ad_width: Option<u32>,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub ad_height: Option<u32>,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub screen_footer_width: Option<u32>,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub screen_footer_height: Option<u32>,
}

/// Parse the document body into raw items
pub fn parse_items(body: &str) -> Result<Vec<RawItem>, serde_json::Error> {
    let value: Value = serde_json::from_str(body)?;
    match value {
        Value::String(inner) => serde_json::from_str(&inner),
        other => serde_json::from_value(other),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_array() {
        let body = r#"[{"ad_time":"65a0c0f0","slot_id":17,"IMGtop":"https://cdn.test/a.png","ad_width":"1080","ad_height":1500}]"#;
        let items = parse_items(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].ad_time, "65a0c0f0");
        assert_eq!(items[0].slot_id, "17");
        assert_eq!(items[0].ad_width, Some(1080));
        assert_eq!(items[0].ad_height, Some(1500));
        assert_eq!(items[0].screen_width, None);
    }

    #[test]
    fn test_parse_string_wrapped_array() {
        let inner = r#"[{"ad_time":"0","slot_id":"a"},{"ad_time":"1","slot_id":"b"}]"#;
        let body = serde_json::to_string(inner).unwrap();
        let items = parse_items(&body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].slot_id, "b");
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_items(r#"{"ad_time":"0"}"#).is_err());
        assert!(parse_items("<html>").is_err());
    }

    #[test]
    fn test_null_fields_become_empty() {
        let items = parse_items(r#"[{"ad_time":null,"IMGbottom":null}]"#).unwrap();
        assert_eq!(items[0].ad_time, "");
        assert_eq!(items[0].image_bottom, "");
    }
}
