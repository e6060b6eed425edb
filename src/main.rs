use job_alerts_bot::config::get_configuration;
use job_alerts_bot::startup::Application;
use job_alerts_bot::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber(
        String::from("job_alerts_bot"),
        String::from("info"),
        std::io::stdout,
    );
    init_subscriber(subscriber);

    let config = get_configuration().expect("Failed to read configuration.");
    let application = Application::build(config)
        .await
        .expect("Failed to build application.");

    tracing::info!("Health check listening on port {}", application.get_port());

    application.run_until_stopped().await
}
