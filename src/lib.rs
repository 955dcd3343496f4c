//! Objsync: Client-Side Business Object Synchronization
//!
//! A client that mirrors server-managed business objects, paged query results and server-declared
//! actions, kept in sync with an application server over a JSON request/response protocol.

pub mod action;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod notification;
pub mod object;
pub mod payload;
pub mod query;
pub mod transport;
pub mod value;

pub use action::{Action, ActionBehavior, ActionDefinition, ActionRegistry};
pub use client::{Client, Hooks};
pub use error::{ClientError, TransportError};
pub use notification::{Notification, NotificationType};
pub use object::{Attribute, BusinessObject, WriteOutcome};
pub use query::{Column, Query, Row};
pub use value::ServiceValue;
