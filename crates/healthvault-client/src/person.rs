//! Person and record lookups.

use serde::Serialize;

use healthvault_core::{PersonId, RecordId, XmlElement, XmlWriter, find_elements, find_text};

use crate::connection::Connection;
use crate::envelope::MethodRequest;
use crate::error::{ClientError, ClientResult};

/// A record the application may access on a person's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthRecordInfo {
    pub id: RecordId,
    pub name: String,
    pub display_name: Option<String>,
    pub relationship: Option<String>,
    pub is_custodian: bool,
}

impl HealthRecordInfo {
    fn from_element(element: &XmlElement) -> ClientResult<Self> {
        let id = element
            .attr("id")
            .ok_or_else(|| ClientError::unexpected("record without id"))?
            .parse::<RecordId>()?;
        Ok(Self {
            id,
            name: element.text()?,
            display_name: element.attr("display-name").map(str::to_string),
            relationship: element.attr("rel-name").map(str::to_string),
            is_custodian: element
                .attr("record-custodian")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        })
    }
}

/// The person a session acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonInfo {
    pub person_id: PersonId,
    pub name: String,
    pub selected_record_id: Option<RecordId>,
    pub records: Vec<HealthRecordInfo>,
}

impl PersonInfo {
    /// Parse the `<person-info>` returned by GetPersonInfo.
    pub fn parse(info_xml: &str) -> ClientResult<Self> {
        let person_id = find_text(info_xml, "person-info/person-id")?
            .ok_or_else(|| ClientError::unexpected("person-info has no person-id"))?
            .parse::<PersonId>()?;
        let name = find_text(info_xml, "person-info/name")?.unwrap_or_default();
        let selected_record_id = find_text(info_xml, "person-info/selected-record-id")?
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<RecordId>())
            .transpose()?;
        let records = find_elements(info_xml, "person-info/record")?
            .iter()
            .map(HealthRecordInfo::from_element)
            .collect::<ClientResult<Vec<_>>>()?;

        Ok(Self {
            person_id,
            name,
            selected_record_id,
            records,
        })
    }

    /// Selected record, falling back to the first authorized one.
    pub fn selected_record(&self) -> Option<&HealthRecordInfo> {
        self.selected_record_id
            .and_then(|id| self.records.iter().find(|r| r.id == id))
            .or_else(|| self.records.first())
    }
}

/// Calls about the person behind the connection's credential.
#[derive(Debug, Clone)]
pub struct PersonClient {
    connection: Connection,
}

impl PersonClient {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn get_person_info(&self) -> ClientResult<PersonInfo> {
        let response = self
            .connection
            .execute(MethodRequest::new("GetPersonInfo", 1))
            .await?;
        PersonInfo::parse(response.info()?)
    }

    /// Records among `ids` that the person has authorized this application for.
    pub async fn get_authorized_records(
        &self,
        ids: &[RecordId],
    ) -> ClientResult<Vec<HealthRecordInfo>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut info = XmlWriter::new();
        for id in ids {
            info.element("id", &id.to_string());
        }
        let request = MethodRequest::new("GetAuthorizedRecords", 1).with_info(info.finish()?);

        let response = self.connection.execute(request).await?;
        find_elements(response.info()?, "record")?
            .iter()
            .map(HealthRecordInfo::from_element)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON_INFO: &str = r#"<person-info>
        <person-id>7a2d6a3e-2a3b-4c1d-9e8f-0a1b2c3d4e5f</person-id>
        <name>Jane Doe</name>
        <selected-record-id>11111111-2222-3333-4444-555555555555</selected-record-id>
        <record id="99999999-2222-3333-4444-555555555555" record-custodian="false" rel-name="Child" display-name="Sam">Sam Doe</record>
        <record id="11111111-2222-3333-4444-555555555555" record-custodian="true" rel-name="Self" display-name="Jane">Jane Doe</record>
    </person-info>"#;

    #[test]
    fn test_parse_person_info() {
        let info = PersonInfo::parse(PERSON_INFO).unwrap();
        assert_eq!(
            info.person_id.to_string(),
            "7a2d6a3e-2a3b-4c1d-9e8f-0a1b2c3d4e5f"
        );
        assert_eq!(info.name, "Jane Doe");
        assert_eq!(info.records.len(), 2);

        let selected = info.selected_record().unwrap();
        assert_eq!(selected.name, "Jane Doe");
        assert!(selected.is_custodian);
        assert_eq!(selected.relationship.as_deref(), Some("Self"));
        assert_eq!(selected.display_name.as_deref(), Some("Jane"));

        assert!(!info.records[0].is_custodian);
    }

    #[test]
    fn test_selected_record_falls_back_to_first() {
        let xml = r#"<person-info><person-id>7a2d6a3e-2a3b-4c1d-9e8f-0a1b2c3d4e5f</person-id><selected-record-id/><record id="99999999-2222-3333-4444-555555555555">A &amp; B</record></person-info>"#;
        let info = PersonInfo::parse(xml).unwrap();
        assert!(info.selected_record_id.is_none());
        assert_eq!(info.selected_record().unwrap().name, "A & B");
    }

    #[test]
    fn test_parse_rejects_missing_person_id() {
        let err = PersonInfo::parse("<person-info><name>x</name></person-info>").unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse(_)));

        let err = PersonInfo::parse(
            "<person-info><person-id>7a2d6a3e-2a3b-4c1d-9e8f-0a1b2c3d4e5f</person-id><record>x</record></person-info>",
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse(_)));
    }
}
