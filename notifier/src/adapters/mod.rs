pub mod brevo_email_client;
pub mod csv_teacher_directory;
pub mod dynamodb_teacher_directory;
pub mod gmail_notifier;
pub mod mx_domain_checker;
