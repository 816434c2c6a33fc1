mod cli;
mod infra;
mod report;
mod routes;
mod server;

use order_audit::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
