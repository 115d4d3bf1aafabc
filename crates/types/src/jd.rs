//! JDownloader local API request/response shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `linkgrabberv2/addLinks` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLinksRequest {
    /// Newline separated links
    pub links: String,
    /// Start downloading immediately
    pub autostart: bool,
    /// Let JD crawl into folder links
    pub deep_decrypt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_password: Option<String>,
}

/// `linkgrabberv2/addContainer` request body, `params = [type, base64 content]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddContainerRequest {
    pub params: (String, String),
}

/// Container formats JD accepts through `addContainer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    Dlc,
    Ccf,
    Rsdf,
}

/// Error object returned by the JD API, e.g.
/// `{"src": "DEVICE", "type": "BAD_PARAMETERS", "data": null}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JdErrorResponse {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl AddLinksRequest {
    pub fn new(links: &[String], package_name: Option<&str>, password: Option<&str>) -> Self {
        Self {
            links: links.join("\n"),
            autostart: false,
            deep_decrypt: true,
            package_name: package_name.map(str::to_string),
            extract_password: password.map(str::to_string),
        }
    }
}

impl AddContainerRequest {
    pub fn new(kind: ContainerType, encoded_payload: String) -> Self {
        Self {
            params: (kind.as_str().to_string(), encoded_payload),
        }
    }
}

impl ContainerType {
    /// Derive the container type from a filename extension, defaulting to DLC
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "ccf" => ContainerType::Ccf,
            "rsdf" => ContainerType::Rsdf,
            _ => ContainerType::Dlc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Dlc => "DLC",
            ContainerType::Ccf => "CCF",
            ContainerType::Rsdf => "RSDF",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_links_wire_format() {
        let links = vec!["http://a".to_string(), "http://b".to_string()];
        let request = AddLinksRequest::new(&links, Some("pkg"), None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["links"], "http://a\nhttp://b");
        assert_eq!(json["autostart"], false);
        assert_eq!(json["deepDecrypt"], true);
        assert_eq!(json["packageName"], "pkg");
        assert!(json.get("extractPassword").is_none());
    }

    #[test]
    fn test_container_type_from_filename() {
        assert_eq!(ContainerType::from_filename("movie.DLC"), ContainerType::Dlc);
        assert_eq!(ContainerType::from_filename("a.ccf"), ContainerType::Ccf);
        assert_eq!(ContainerType::from_filename("a.rsdf"), ContainerType::Rsdf);
        assert_eq!(ContainerType::from_filename("noext"), ContainerType::Dlc);
    }

    #[test]
    fn test_add_container_params_are_a_pair() {
        let request = AddContainerRequest::new(ContainerType::Dlc, "AAAA".to_string());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["params"], serde_json::json!(["DLC", "AAAA"]));
    }
}
