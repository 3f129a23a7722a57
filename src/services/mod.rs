pub mod auth_service;
pub mod catalog_service;
pub mod payment;
pub mod progress_service;
pub mod schedule_service;
pub mod subscription_service;
pub mod task_queue;
pub mod user_service;

pub use auth_service::*;
pub use catalog_service::*;
pub use payment::{
    ClickGateway, PaymeGateway, PaymentDispatcher, PaymentError, PaymentProvider, Settlement,
};
pub use progress_service::*;
pub use schedule_service::*;
pub use subscription_service::*;
pub use task_queue::*;
pub use user_service::*;
