use actix_web::{web, App, HttpServer};
use clap::Parser;
use log::info;
use orbital_payouts::{configure, ApiConfig, DEFAULT_MAX_EPOCH, MAX_EPOCH_LIMIT};

#[derive(Parser, Debug)]
#[command(name = "orbital-payouts")]
#[command(about = "Serves Orbital Auction payout weights per epoch")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    #[arg(long, short, default_value_t = 3000)]
    port: u16,

    /// Largest epoch number served
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_EPOCH,
        value_parser = clap::value_parser!(u64).range(1..=MAX_EPOCH_LIMIT)
    )]
    max_epoch: u64,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = web::Data::new(ApiConfig {
        max_epoch: args.max_epoch,
    });

    info!(
        "Payout weights API listening at http://{}:{} (max epoch {})",
        args.bind, args.port, args.max_epoch
    );

    HttpServer::new(move || App::new().app_data(config.clone()).configure(configure))
        .bind((args.bind.as_str(), args.port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_epoch_is_bounded() {
        let args = Args::try_parse_from(["orbital-payouts"]).unwrap();
        assert_eq!(args.max_epoch, DEFAULT_MAX_EPOCH);

        let args = Args::try_parse_from(["orbital-payouts", "--max-epoch", "1000000000000"]).unwrap();
        assert_eq!(args.max_epoch, MAX_EPOCH_LIMIT);

        assert!(Args::try_parse_from(["orbital-payouts", "--max-epoch", "1000000000001"]).is_err());
        assert!(Args::try_parse_from(["orbital-payouts", "--max-epoch", "0"]).is_err());
    }
}
