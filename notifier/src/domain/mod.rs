pub mod delivery;
pub mod domain_checker;
pub mod email_client;
pub mod recipient_email;
pub mod recipient_resolver;
pub mod records;
