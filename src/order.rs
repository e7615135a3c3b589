use serde::{Deserialize, Serialize};

/// A new order announced to the order queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotification {
    pub order_text: String,
    pub merchant_id: String,
}

/// Orders to be forwarded to the CRM through the relay queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRelayBatch {
    pub order_ids: Vec<String>,
}

impl OrderNotification {
    pub fn new(order_text: impl Into<String>, merchant_id: impl Into<String>) -> Self {
        Self {
            order_text: order_text.into(),
            merchant_id: merchant_id.into(),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for OrderRelayBatch {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            order_ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
