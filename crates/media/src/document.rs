//! Extraction of deployment credentials from a decrypted media variables
//! document.
//!
//! The document is a `<MediaVarList>` of `<var name="...">value</var>`
//! elements. Only a handful of the variables matter for lateral movement;
//! the rest (timeouts, certificates, UI flags) are ignored.

use roxmltree::Document;

use crate::MediaError;

const VAR_MEDIA_GUID: &str = "_SMSMediaGuid";
const VAR_MEDIA_PFX: &str = "_SMSTSMediaPFX";
const VAR_MANAGEMENT_POINT: &str = "SMSTSMP";
const VAR_SITE_CODE: &str = "_SMSTSSiteCode";
const VAR_UNKNOWN_MACHINE_GUID: &str = "_SMSTSx64UnknownMachineGUID";

/// Deployment credentials pulled out of a media variables document.
///
/// `media_guid` doubles as the import password for the PFX blob in
/// `media_pfx`, so these two together are a usable client certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaVariables {
    /// Media GUID, also the password protecting the PFX blob.
    pub media_guid: String,
    /// Base64-encoded client authentication certificate (PKCS#12).
    pub media_pfx: String,
    /// Management point URL, scheme included.
    pub management_point: String,
    /// Three-character site code.
    pub site_code: String,
    /// GUID the site hands to unknown x64 machines.
    pub unknown_machine_guid: String,
}

impl MediaVariables {
    /// Management point host with any `http://` or `https://` prefix
    /// removed, as expected by tooling that takes a bare DNS name.
    pub fn management_point_dns(&self) -> &str {
        let mp = self.management_point.as_str();
        mp.strip_prefix("https://")
            .or_else(|| mp.strip_prefix("http://"))
            .unwrap_or(mp)
    }
}

/// Parse a decrypted media variables document and pull out the variables
/// listed in [`MediaVariables`].
pub fn extract_variables(xml: &str) -> Result<MediaVariables, MediaError> {
    let document = Document::parse(xml).map_err(|_| MediaError::MalformedDocument {
        variable: "MediaVarList",
    })?;

    let lookup = |name: &'static str| -> Result<String, MediaError> {
        document
            .descendants()
            .find(|node| node.has_tag_name("var") && node.attribute("name") == Some(name))
            .and_then(|node| node.text())
            .map(str::to_string)
            .ok_or(MediaError::MalformedDocument { variable: name })
    };

    Ok(MediaVariables {
        media_guid: lookup(VAR_MEDIA_GUID)?,
        media_pfx: lookup(VAR_MEDIA_PFX)?,
        management_point: lookup(VAR_MANAGEMENT_POINT)?,
        site_code: lookup(VAR_SITE_CODE)?,
        unknown_machine_guid: lookup(VAR_UNKNOWN_MACHINE_GUID)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> String {
        let vars = [
            ("_SMSMediaGuid", "7a1c3db2-0f51-4c89-9d30-111122223333"),
            ("_SMSTSMediaPFX", "MIIKcQIBAzCCCjc="),
            ("SMSTSMP", "https://mp01.corp.example.com"),
            ("_SMSTSSiteCode", "PS1"),
            (
                "_SMSTSx64UnknownMachineGUID",
                "d4f0c9aa-8c21-4f11-be02-444455556666",
            ),
            ("SMSTSBootTimeout", "120"),
        ];

        let mut xml = String::from("<MediaVarList Version=\"1\">");
        for (name, value) in vars {
            xml.push_str(&format!("<var name=\"{name}\">{value}</var>"));
        }
        xml.push_str("</MediaVarList>");
        xml
    }

    #[test]
    fn test_extracts_all_variables() {
        let variables = extract_variables(&sample_document()).unwrap();
        assert_eq!(variables.media_guid, "7a1c3db2-0f51-4c89-9d30-111122223333");
        assert_eq!(variables.media_pfx, "MIIKcQIBAzCCCjc=");
        assert_eq!(variables.management_point, "https://mp01.corp.example.com");
        assert_eq!(variables.site_code, "PS1");
        assert_eq!(
            variables.unknown_machine_guid,
            "d4f0c9aa-8c21-4f11-be02-444455556666"
        );
    }

    #[test]
    fn test_management_point_dns_strips_scheme() {
        let mut variables = extract_variables(&sample_document()).unwrap();
        assert_eq!(variables.management_point_dns(), "mp01.corp.example.com");

        variables.management_point = "http://mp01.corp.example.com".to_string();
        assert_eq!(variables.management_point_dns(), "mp01.corp.example.com");

        variables.management_point = "mp01.corp.example.com".to_string();
        assert_eq!(variables.management_point_dns(), "mp01.corp.example.com");
    }

    #[test]
    fn test_missing_variable_is_named() {
        let xml = sample_document().replace("_SMSTSSiteCode", "_SMSTSSiteCodeX");
        assert_eq!(
            extract_variables(&xml),
            Err(MediaError::MalformedDocument {
                variable: "_SMSTSSiteCode",
            })
        );
    }

    #[test]
    fn test_unparseable_document() {
        assert!(matches!(
            extract_variables("not xml at all"),
            Err(MediaError::MalformedDocument { .. })
        ));
    }
}
