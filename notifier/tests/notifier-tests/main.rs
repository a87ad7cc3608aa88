mod brevo_client;
mod campaign;
mod commands;
