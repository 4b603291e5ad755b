//! Escrow CLI
//!
//! Command-line interface for the escrow marketplace API.

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};

use escrow_client::{EscrowClient, Upload};
use escrow_types::domain::{Currency, PartyRole, PaymentMethod, PaymentStatus, TransactionId};
use escrow_types::{CreateShopRequest, CreateTransactionRequest};

#[derive(Parser)]
#[command(name = "escrow")]
#[command(author, version, about = "Escrow marketplace API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the escrow API
    #[arg(long, env = "ESCROW_API_URL", default_value = "http://localhost:4000")]
    api_url: String,

    /// Bearer token from `escrow user login`
    #[arg(long, env = "ESCROW_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account operations
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Transaction operations
    Transaction {
        #[command(subcommand)]
        action: TransactionCommands,
    },
    /// Dispute operations
    Dispute {
        #[command(subcommand)]
        action: DisputeCommands,
    },
    /// Shop operations
    Shop {
        #[command(subcommand)]
        action: ShopCommands,
    },
    /// Quote the commission for an amount in pesewas
    Commission { amount: i64 },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Log in and print the access token
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// Show the authenticated user
    Me,
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// Open a transaction as buyer or seller
    Create {
        #[arg(long)]
        title: String,
        /// Amount in pesewas
        #[arg(long)]
        amount: i64,
        /// BUYER or SELLER
        #[arg(long, default_value = "BUYER")]
        role: String,
        #[arg(long)]
        counterparty_phone: Option<String>,
        #[arg(long)]
        counterparty_code: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        seller_momo_number: Option<String>,
        /// Product image to upload
        #[arg(long)]
        image: Option<String>,
    },
    /// Get a transaction by ID or code
    Get { id_or_code: String },
    /// Show a transaction's status
    Status { id: String },
    /// List the caller's transactions
    Mine,
    /// Purchase statistics for the caller
    Statistics,
    /// Platform totals (admin)
    Stats,
    /// Accept a transaction as the counterparty
    Accept { id: String },
    /// Record the buyer's payment
    Pay {
        id: String,
        #[arg(long)]
        reference: String,
        #[arg(long, default_value = "SUCCESS")]
        status: String,
        #[arg(long, default_value = "MOMO")]
        method: String,
    },
    /// Release escrowed funds to the seller
    Release { id: String },
}

#[derive(Subcommand)]
enum DisputeCommands {
    /// Open a dispute on a funded transaction
    Open {
        id: String,
        #[arg(long)]
        reason: String,
        /// Evidence file to upload
        #[arg(long)]
        evidence: Option<String>,
    },
    /// List disputes of a transaction
    List { id: String },
    /// Settle the active dispute (admin)
    Settle {
        id: String,
        /// Refund the buyer instead of paying the seller
        #[arg(long)]
        to_buyer: bool,
        #[arg(long)]
        resolution: Option<String>,
    },
}

#[derive(Subcommand)]
enum ShopCommands {
    /// List all shops
    List,
    /// Search shops by name; `all` lists every shop
    Search { identifier: String },
    /// Create a shop for the caller
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        momo_number: String,
        #[arg(long)]
        location: Option<String>,
        /// Shop icon to upload
        #[arg(long)]
        icon: Option<String>,
    },
}

fn parse_transaction_id(s: &str) -> Result<TransactionId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid transaction ID: {}", s))
}

async fn read_upload(path: Option<String>) -> Result<Option<Upload>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path, e))?;
    let file_name = Path::new(&path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(Some(Upload {
        content_type: guess_content_type(&file_name).map(String::from),
        file_name,
        bytes,
    }))
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = EscrowClient::new(&cli.api_url);
    if let Some(token) = cli.token {
        client = client.with_token(token);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Commission { amount } => print_json(&client.commission(amount).await?)?,

        Commands::User { action } => match action {
            UserCommands::Register {
                name,
                phone,
                password,
                email,
            } => print_json(&client.register(&name, &phone, &password, email).await?)?,
            UserCommands::Login { phone, password } => {
                let auth = client.login(&phone, &password).await?;
                println!("{}", auth.access_token);
            }
            UserCommands::Me => print_json(&client.me().await?)?,
        },

        Commands::Transaction { action } => match action {
            TransactionCommands::Create {
                title,
                amount,
                role,
                counterparty_phone,
                counterparty_code,
                description,
                seller_momo_number,
                image,
            } => {
                let req = CreateTransactionRequest {
                    title,
                    description,
                    amount,
                    currency: Currency::default(),
                    initiate_by: role.parse::<PartyRole>()?,
                    counterparty_code,
                    counterparty_phone,
                    seller_momo_number,
                    delivery_number: None,
                    commission_fee: None,
                };
                let image = read_upload(image).await?;
                print_json(&client.create_transaction(&req, image).await?)?;
            }
            TransactionCommands::Get { id_or_code } => {
                let details = match id_or_code.parse::<TransactionId>() {
                    Ok(id) => client.get_transaction(id).await?,
                    Err(_) => client.transaction_by_code(&id_or_code).await?,
                };
                print_json(&details)?;
            }
            TransactionCommands::Status { id } => {
                let id = parse_transaction_id(&id)?;
                print_json(&client.transaction_status(id).await?)?;
            }
            TransactionCommands::Mine => print_json(&client.my_transactions().await?)?,
            TransactionCommands::Statistics => print_json(&client.statistics().await?)?,
            TransactionCommands::Stats => print_json(&client.stats().await?)?,
            TransactionCommands::Accept { id } => {
                let id = parse_transaction_id(&id)?;
                print_json(&client.accept(id).await?)?;
            }
            TransactionCommands::Pay {
                id,
                reference,
                status,
                method,
            } => {
                let id = parse_transaction_id(&id)?;
                let status = status.parse::<PaymentStatus>()?;
                let method = method.parse::<PaymentMethod>()?;
                print_json(
                    &client
                        .confirm_payment(id, &reference, status, method)
                        .await?,
                )?;
            }
            TransactionCommands::Release { id } => {
                let id = parse_transaction_id(&id)?;
                print_json(&client.release(id).await?)?;
            }
        },

        Commands::Dispute { action } => match action {
            DisputeCommands::Open {
                id,
                reason,
                evidence,
            } => {
                let id = parse_transaction_id(&id)?;
                let evidence = read_upload(evidence).await?;
                print_json(&client.open_dispute(id, &reason, evidence).await?)?;
            }
            DisputeCommands::List { id } => {
                let id = parse_transaction_id(&id)?;
                print_json(&client.transaction_disputes(id).await?)?;
            }
            DisputeCommands::Settle {
                id,
                to_buyer,
                resolution,
            } => {
                let id = parse_transaction_id(&id)?;
                print_json(&client.settle_dispute(id, to_buyer, resolution).await?)?;
            }
        },

        Commands::Shop { action } => match action {
            ShopCommands::List => print_json(&client.list_shops().await?)?,
            ShopCommands::Search { identifier } => {
                print_json(&client.search_shops(&identifier).await?)?
            }
            ShopCommands::Create {
                name,
                description,
                momo_number,
                location,
                icon,
            } => {
                let req = CreateShopRequest {
                    shop_name: name,
                    description,
                    momo_number,
                    email: None,
                    address: None,
                    location,
                };
                let icon = read_upload(icon).await?;
                print_json(&client.create_shop(&req, icon).await?)?;
            }
        },
    }

    Ok(())
}
