//! # Catalog Seeder
//!
//! Populates ticket types, lines and stops for development and demos.
//!
//! ## Usage
//! ```bash
//! cargo run -p transit-db --bin seed
//!
//! # Specify database path
//! cargo run -p transit-db --bin seed -- --db ./data/transit.db
//! ```
//!
//! ## Seeded Catalog
//! - `SIMPLE`: single trip, priced by line distance
//! - `STUDENT`: single trip at the student fare
//! - `DAY_PASS`: unlimited-ish trips for 24 hours
//! - `CARNET_10`: ten trips, valid 30 days
//! - Five Lomé lines with their stops, including one student shuttle

use std::env;
use transit_core::{LineCategory, Money, PricingMode};
use transit_db::{Database, DbConfig, NewLine, NewTicketType};

/// (code, name, price, mode, validity hours, trips, student)
const TICKET_TYPES: &[(&str, &str, i64, PricingMode, Option<i64>, i64, bool)] = &[
    ("SIMPLE", "Ticket simple", 200, PricingMode::Distance, Some(24), 1, false),
    ("STUDENT", "Ticket étudiant", 100, PricingMode::Flat, Some(24), 1, true),
    ("DAY_PASS", "Pass journée", 500, PricingMode::Flat, Some(24), 20, false),
    ("CARNET_10", "Carnet 10 voyages", 1800, PricingMode::Flat, Some(720), 10, false),
];

/// (number, origin, destination, km, category, stops)
const LINES: &[(&str, &str, &str, f64, LineCategory, &[&str])] = &[
    (
        "1",
        "Grand Marché",
        "Bè",
        4.5,
        LineCategory::Ordinary,
        &["Grand Marché", "Assigamé", "Bè Kpota", "Bè"],
    ),
    (
        "3",
        "Bè",
        "Université de Lomé",
        8.5,
        LineCategory::Ordinary,
        &["Bè", "Tokoin", "Hôpital", "Université de Lomé"],
    ),
    (
        "12",
        "Adidogomé",
        "Grand Marché",
        12.0,
        LineCategory::Ordinary,
        &["Adidogomé", "Avédji", "Hédzranawoé", "Déckon", "Grand Marché"],
    ),
    (
        "21",
        "Agoè",
        "Port Autonome",
        23.0,
        LineCategory::Ordinary,
        &["Agoè Assiyéyé", "Cacaveli", "Colombe de la Paix", "Port Autonome"],
    ),
    (
        "U1",
        "Adidogomé",
        "Université de Lomé",
        10.0,
        LineCategory::Student,
        &["Adidogomé", "Djidjolé", "Université de Lomé"],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| String::from("./transit_dev.db"));

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("SOTRAL Catalog Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $DATABASE_PATH or ./transit_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("SOTRAL Catalog Seeder");
    println!("=====================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let catalog = db.catalog();

    if !catalog.list_ticket_types(false).await?.is_empty() {
        println!("⚠ Catalog already seeded, nothing to do.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (code, name, price, mode, validity_hours, max_trips, student) in TICKET_TYPES {
        catalog
            .insert_ticket_type(&NewTicketType {
                code: code.to_string(),
                name: name.to_string(),
                description: None,
                price: Money::fcfa(*price),
                pricing_mode: *mode,
                validity_hours: *validity_hours,
                max_trips: *max_trips,
                student_discount: *student,
            })
            .await?;
        println!("  + ticket type {}", code);
    }

    for (number, origin, destination, km, category, stops) in LINES {
        let line = catalog
            .insert_line(&NewLine {
                line_number: number.to_string(),
                name: format!("{} - {}", origin, destination),
                origin: origin.to_string(),
                destination: destination.to_string(),
                distance_km: *km,
                category: *category,
            })
            .await?;

        for (sequence, stop) in stops.iter().enumerate() {
            catalog.insert_stop(line.id, stop, sequence as i64 + 1).await?;
        }
        println!("  + line {} ({} km, {} stops)", number, km, stops.len());
    }

    db.close().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
