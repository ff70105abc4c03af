//! Event records as returned by the event source

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SourceError;

/// One opaque event: a JSON object whose only required field is `created`
/// (Unix seconds). Everything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn created(&self) -> Option<i64> {
        self.0.get("created").and_then(Value::as_i64)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for Event {
    type Error = SourceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(SourceError::Malformed(format!(
                "event is not an object: {}",
                other
            ))),
        }
    }
}

/// One page of `GET /v1/events`
#[derive(Debug, Clone, Deserialize)]
pub struct EventPage {
    pub has_more: bool,
    pub data: Vec<Event>,
}

impl EventPage {
    /// Every event must carry an integer `created`; an `id` is needed on the
    /// last event when another page follows, since it is the cursor.
    pub fn validate(&self) -> Result<(), SourceError> {
        for (index, event) in self.data.iter().enumerate() {
            if event.created().is_none() {
                return Err(SourceError::Malformed(format!(
                    "event {} has no integer 'created' field",
                    event.id().map(String::from).unwrap_or_else(|| format!("#{index}"))
                )));
            }
        }
        if self.has_more
            && let Some(last) = self.data.last()
            && last.id().is_none()
        {
            return Err(SourceError::Malformed(
                "last event of a continued page has no 'id'".into(),
            ));
        }
        Ok(())
    }

    /// Cursor for the following page, if there is one.
    pub fn next_cursor(&self) -> Option<&str> {
        if self.has_more {
            self.data.last().and_then(Event::id)
        } else {
            None
        }
    }
}
