//! Reading and writing things in a health record.
//!
//! Only the envelope of a thing is typed. Its `<data-xml>` payload follows a
//! per-type schema and is carried through untouched.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use healthvault_core::{
    RecordId, ThingKey, ThingTypeId, XmlElement, XmlWriter, find_child, find_elements,
};

use crate::connection::Connection;
use crate::envelope::MethodRequest;
use crate::error::{ClientError, ClientResult};

/// Lifecycle state of a thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ThingState {
    #[default]
    Active,
    Deleted,
}

impl ThingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ThingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThingState {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Active" => Ok(Self::Active),
            "Deleted" => Ok(Self::Deleted),
            other => Err(ClientError::unexpected(format!(
                "unknown thing state '{other}'"
            ))),
        }
    }
}

/// A single item of health data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thing {
    /// Absent until the thing has been stored.
    pub key: Option<ThingKey>,
    pub type_id: ThingTypeId,
    /// Display name of the type, as reported by the service.
    pub type_name: Option<String>,
    pub state: ThingState,
    pub flags: u32,
    /// `<eff-date>` as sent by the service (local time, no offset).
    pub effective_date: Option<String>,
    /// Inner XML of `<data-xml>`.
    pub data_xml: String,
}

impl Thing {
    /// New, unsaved thing of `type_id`.
    pub fn new(type_id: ThingTypeId, data_xml: impl Into<String>) -> Self {
        Self {
            key: None,
            type_id,
            type_name: None,
            state: ThingState::Active,
            flags: 0,
            effective_date: None,
            data_xml: data_xml.into(),
        }
    }

    /// Reads only direct children of `<thing>`; `<data-xml>` stays opaque.
    fn from_element(element: &XmlElement) -> ClientResult<Self> {
        let xml = element.inner_xml.as_str();
        let child_text = |name: &str| -> ClientResult<Option<String>> {
            Ok(find_child(xml, name)?.map(|e| e.text()).transpose()?)
        };

        let key = find_child(xml, "thing-id")?
            .map(|e| parse_key(&e))
            .transpose()?;
        let type_element = find_child(xml, "type-id")?
            .ok_or_else(|| ClientError::unexpected("thing without type-id"))?;
        let type_id = type_element.text()?.parse::<ThingTypeId>()?;
        let state = child_text("thing-state")?
            .map(|s| s.parse::<ThingState>())
            .transpose()?
            .unwrap_or_default();
        let flags = match child_text("flags")? {
            Some(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| ClientError::unexpected(format!("invalid flags '{s}'")))?,
            None => 0,
        };

        Ok(Self {
            key,
            type_id,
            type_name: type_element.attr("name").map(str::to_string),
            state,
            flags,
            effective_date: child_text("eff-date")?,
            data_xml: find_child(xml, "data-xml")?
                .map(|e| e.inner_xml)
                .unwrap_or_default(),
        })
    }

    fn write_xml(&self, w: &mut XmlWriter) {
        w.start("thing");
        if let Some(key) = &self.key {
            write_key(w, key);
        }
        w.element("type-id", &self.type_id.to_string())
            .element("thing-state", self.state.as_str())
            .element("flags", &self.flags.to_string());
        if let Some(date) = &self.effective_date {
            w.element("eff-date", date);
        }
        w.start("data-xml").raw(&self.data_xml).end("data-xml");
        w.end("thing");
    }
}

fn parse_key(element: &XmlElement) -> ClientResult<ThingKey> {
    Ok(ThingKey::parse(
        &element.text()?,
        element.attr("version-stamp"),
    )?)
}

fn write_key(w: &mut XmlWriter, key: &ThingKey) {
    let id = key.id.hyphenated().to_string();
    match key.version_stamp {
        Some(stamp) => {
            let stamp = stamp.hyphenated().to_string();
            w.element_with("thing-id", &[("version-stamp", stamp.as_str())], &id);
        }
        None => {
            w.element("thing-id", &id);
        }
    }
}

/// Selection of things for GetThings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThingQuery {
    pub ids: Vec<ThingKey>,
    pub type_ids: Vec<ThingTypeId>,
    pub max: Option<u32>,
}

impl ThingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, key: ThingKey) -> Self {
        self.ids.push(key);
        self
    }

    pub fn with_type(mut self, type_id: ThingTypeId) -> Self {
        self.type_ids.push(type_id);
        self
    }

    pub fn with_max(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }

    /// `<group>` element; always asks for the core section as XML.
    pub fn to_xml(&self) -> ClientResult<String> {
        let mut w = XmlWriter::new();
        match self.max {
            Some(max) => {
                let max = max.to_string();
                w.start_with("group", &[("max", max.as_str())]);
            }
            None => {
                w.start("group");
            }
        }
        for key in &self.ids {
            w.element("id", &key.id.hyphenated().to_string());
        }
        if !self.type_ids.is_empty() {
            w.start("filter");
            for type_id in &self.type_ids {
                w.element("type-id", &type_id.to_string());
            }
            w.end("filter");
        }
        w.start("format")
            .element("section", "core")
            .empty("xml")
            .end("format")
            .end("group");
        Ok(w.finish()?)
    }
}

/// Parse every `<thing>` in a GetThings `<info>`.
pub fn parse_things(info_xml: &str) -> ClientResult<Vec<Thing>> {
    find_elements(info_xml, "group/thing")?
        .iter()
        .map(Thing::from_element)
        .collect()
}

/// Thing operations against one record.
#[derive(Debug, Clone)]
pub struct ThingClient {
    connection: Connection,
    record_id: RecordId,
}

impl ThingClient {
    pub fn new(connection: Connection, record_id: RecordId) -> Self {
        Self {
            connection,
            record_id,
        }
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    fn request(&self, name: &str, version: u32, info_xml: String) -> MethodRequest {
        MethodRequest::new(name, version)
            .with_record(self.record_id)
            .with_info(info_xml)
    }

    pub async fn get_things(&self, query: &ThingQuery) -> ClientResult<Vec<Thing>> {
        let request = self.request("GetThings", 3, query.to_xml()?);
        let response = self.connection.execute(request).await?;
        parse_things(response.info()?)
    }

    /// The thing with `key`'s id, if the record has it.
    pub async fn get_thing(&self, key: &ThingKey) -> ClientResult<Option<Thing>> {
        let query = ThingQuery::new().with_id(*key);
        Ok(self.get_things(&query).await?.into_iter().next())
    }

    /// Create or update things. Returns their keys with new version stamps,
    /// in input order.
    pub async fn put_things(&self, things: &[Thing]) -> ClientResult<Vec<ThingKey>> {
        if things.is_empty() {
            return Ok(Vec::new());
        }
        let mut w = XmlWriter::new();
        for thing in things {
            thing.write_xml(&mut w);
        }
        let request = self.request("PutThings", 2, w.finish()?);
        let response = self.connection.execute(request).await?;

        let keys = find_elements(response.info()?, "thing-id")?
            .iter()
            .map(parse_key)
            .collect::<ClientResult<Vec<_>>>()?;
        if keys.len() != things.len() {
            return Err(ClientError::unexpected(format!(
                "stored {} things but got {} keys",
                things.len(),
                keys.len()
            )));
        }
        Ok(keys)
    }

    pub async fn put_thing(&self, thing: &Thing) -> ClientResult<ThingKey> {
        self.put_things(std::slice::from_ref(thing))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::unexpected("no key returned for stored thing"))
    }

    pub async fn remove_things(&self, keys: &[ThingKey]) -> ClientResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut w = XmlWriter::new();
        for key in keys {
            write_key(&mut w, key);
        }
        let request = self.request("RemoveThings", 1, w.finish()?);
        self.connection.execute(request).await?;
        Ok(())
    }
}
