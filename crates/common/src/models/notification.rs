use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
}

/// One swap notification as relayed from the chat channel (a single embed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    pub fields: Vec<NotificationField>,
}

impl NotificationPayload {
    pub fn new(fields: Vec<NotificationField>) -> Self {
        Self { fields }
    }

    /// Value of the first field called `name`, if any.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for NotificationPayload {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| NotificationField {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }
}
