mod admin;
pub mod dispatch;
mod handlers;
pub mod negotiate;
pub mod response;
mod router;
pub mod templates;

pub use admin::AdminCommand;
pub use dispatch::{Access, Handler, RouteTable, songbook_routes};
pub use router::{AppState, create_router};
