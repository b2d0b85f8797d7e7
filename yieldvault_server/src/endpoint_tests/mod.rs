mod auth;
mod helpers;
mod positions;
mod webhooks;
