pub mod error;
pub mod id;
pub mod time;
pub mod xml;

pub use error::{CoreError, ErrorCategory, Result};
pub use id::{ApplicationId, PersonId, RecordId, ThingKey, ThingTypeId};
pub use time::{format_msg_time, now_utc, parse_service_time};
pub use xml::{
    XmlElement, XmlWriter, check_well_formed, find_all_inner_xml, find_attribute, find_child,
    find_element, find_elements, find_inner_xml, find_text,
};
