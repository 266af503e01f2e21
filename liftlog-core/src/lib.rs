pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod protocol;

pub use config::LiftlogConfig;
pub use error::LiftlogError;
pub use gateway::{
    create_gateway, DataFilter, DataOrder, GatewayError, MemoryGateway, OrderDirection,
    PgSessionGateway, RestSessionGateway, SessionGateway,
};
pub use models::session::{NewSession, Session, SessionId};
