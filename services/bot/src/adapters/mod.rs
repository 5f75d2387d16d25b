pub mod clock;
pub mod db;
pub mod telegram;

pub use clock::SystemClock;
pub use db::SqliteReminderStore;
pub use telegram::TelegramGateway;
