pub mod donation;
pub mod school;
pub mod solar_panel;
pub mod user;

pub use donation::Entity as Donation;
pub use school::Entity as School;
pub use solar_panel::Entity as SolarPanel;
pub use user::Entity as User;
