//! Domain model and services of the allocation core.
//!
//! Entities are plain, strongly typed values; services own `Arc<dyn Port>`
//! handles and an injectable clock, and carry all business rules. Inbound
//! adapters call the services; outbound adapters implement the ports.

pub mod allocation;
pub mod application;
pub mod auction;
pub mod commission;
pub mod config;
pub mod deadline_agent;
pub mod error;
pub mod money;
pub mod notification;
pub mod notifications;
pub mod payment;
pub mod ports;
pub mod prioritization;
pub mod rating;
pub mod rating_service;
pub mod task;
pub mod user;

pub use self::allocation::AllocationService;
pub use self::application::{Application, ApplicationId, ApplicationStatus};
pub use self::auction::{AuctionService, SubmitApplication};
pub use self::commission::{ChatAccess, CommissionService, WebhookEvent, WebhookOutcome};
pub use self::config::{ConfigError, CoreConfig};
pub use self::deadline_agent::{DeadlineAgent, ReminderTier};
pub use self::error::{CoreError, CoreResult, ErrorCode};
pub use self::notification::{Notification, NotificationId, NotificationKind};
pub use self::notifications::{EmitNotification, NotificationService};
pub use self::payment::{
    CommissionStatus, Payment, PaymentId, PaymentMethod, PaymentStatus, SystemCommission,
    SystemWallet,
};
pub use self::rating::Rating;
pub use self::rating_service::{RateUser, RatingService};
pub use self::task::{
    Assignment, AssignmentMethod, Category, Task, TaskDraft, TaskId, TaskStatus,
};
pub use self::user::{DoerType, Role, User, UserId};
