/*
 * Responsibility
 * - middleware public interface
 */
pub mod auth;
pub mod bearer_auth;
pub mod http;
