//! Response envelopes for domain records.
//!
//! Domain types live in crates without an OpenAPI dependency; these
//! transparent wrappers serialize exactly as the record they hold and give
//! it a schema entry.

use hearth_care::{FeedPage, FinalizedHandover, Violation};
use hearth_state::{ActivityEvent, Booking, CareSession, HandoverRecord, Incident};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct BookingView(pub Booking);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct HandoverView(pub HandoverRecord);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct FinalizedView(pub FinalizedHandover);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct SessionView(pub CareSession);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ActivityView(pub ActivityEvent);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct FeedView(pub FeedPage);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct IncidentView(pub Incident);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ViolationView(pub Violation);
