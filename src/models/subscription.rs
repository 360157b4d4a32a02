use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionType {
    Updates,
    Reviews,
    SecurityAlerts,
}

/// A user's subscription to plugin events. Read-only from the pipeline's
/// perspective; rows are managed by the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plugin_id: Uuid,
    pub subscription_type: SubscriptionType,
    pub is_active: bool,
}
