//! Command-line commands and their plain-text rendering.

use crate::error::ClientError;
use crate::mutations::Api;
use crate::screens::{
    BoardFilter, CustomerDirectory, CustomerProfile, InstallmentPlanner, PurchaseBoard,
    PurchaseLedger,
};
use abono_core::validation::PaymentForm;
use abono_core::{CustomerId, Purchase, PurchaseId, PurchaseStatus};
use abono_sync::{MutationDispatcher, QueryView};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;

/// `abono` command line.
#[derive(Parser, Debug)]
#[command(name = "abono", version)]
#[command(about = "Customers, purchases and payments from the console API")]
pub struct Cli {
    /// Path to the TOML config file (falls back to ABONO_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug)]
pub enum Action {
    /// List customers
    Customers {
        /// Filter by name
        search: Vec<String>,
    },
    /// Show a customer and their purchases
    Customer { id: CustomerId },
    /// List purchases
    Purchases {
        #[arg(long)]
        status: Option<PurchaseStatus>,
        #[arg(long)]
        customer: Option<CustomerId>,
        /// Filter the loaded page by description
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Show a purchase and its payments
    Purchase { id: PurchaseId },
    /// Register a payment
    Pay {
        purchase_id: PurchaseId,
        amount: String,
        method: String,
        #[arg(trailing_var_arg = true)]
        note: Vec<String>,
    },
    /// Preview an installment plan
    Simulate { total: String, count: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Customers { search: String },
    Customer { id: CustomerId },
    Purchases { filter: BoardFilter },
    Purchase { id: PurchaseId },
    Pay { purchase_id: PurchaseId, form: PaymentForm },
    Simulate { total: String, count: String },
}

fn usage(reason: impl Into<String>) -> ClientError {
    ClientError::Usage(reason.into())
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        match action {
            Action::Customers { search } => Command::Customers {
                search: search.join(" "),
            },
            Action::Customer { id } => Command::Customer { id },
            Action::Purchases {
                status,
                customer,
                search,
            } => Command::Purchases {
                filter: BoardFilter {
                    description: search,
                    customer_id: customer,
                    status,
                },
            },
            Action::Purchase { id } => Command::Purchase { id },
            Action::Pay {
                purchase_id,
                amount,
                method,
                note,
            } => Command::Pay {
                purchase_id,
                form: PaymentForm {
                    amount,
                    method: method.to_uppercase(),
                    note: note.join(" "),
                },
            },
            Action::Simulate { total, count } => Command::Simulate { total, count },
        }
    }
}

impl Command {
    /// Parse arguments after the program name.
    pub fn parse<I>(args: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = String>,
    {
        let args = std::iter::once("abono".to_string()).chain(args);
        Cli::try_parse_from(args)
            .map(|cli| cli.action.into())
            .map_err(|err| usage(err.to_string().trim_end()))
    }
}

/// Run one command and render its outcome.
pub async fn run(
    command: Command,
    dispatcher: MutationDispatcher<Api>,
) -> Result<String, ClientError> {
    let mut out = String::new();
    match command {
        Command::Customers { search } => {
            let mut directory = CustomerDirectory::open(dispatcher);
            directory.search_now(search);
            let view = directory.settled().await;
            check(&view)?;
            let customers = view.data().map(|page| page.content.as_slice());
            for customer in customers.unwrap_or_default() {
                let _ = writeln!(
                    out,
                    "{:>5}  {:<24} {:<28} {}",
                    customer.id, customer.name, customer.email, customer.phone
                );
            }
        }
        Command::Customer { id } => {
            let mut profile = CustomerProfile::open(dispatcher, id);
            let (customer, purchases) = profile.settled().await;
            check(&customer)?;
            check(&purchases)?;
            if let Some(customer) = customer.data() {
                let _ = writeln!(
                    out,
                    "{} <{}> {}",
                    customer.name, customer.email, customer.phone
                );
                if let Some(notes) = &customer.notes {
                    let _ = writeln!(out, "  {}", notes);
                }
            }
            let listed = purchases.data().map(|page| page.content.as_slice());
            for purchase in listed.unwrap_or_default() {
                write_purchase(&mut out, purchase);
            }
        }
        Command::Purchases { filter } => {
            let mut board = PurchaseBoard::open(dispatcher);
            board.set_filter(filter);
            let view = board.settled().await;
            check(&view)?;
            for purchase in board.visible() {
                write_purchase(&mut out, &purchase);
            }
        }
        Command::Purchase { id } => {
            let mut ledger = PurchaseLedger::open(dispatcher, id);
            ledger.settled().await;
            let purchase = ledger.purchase();
            check(&purchase)?;
            if let Some(purchase) = purchase.data() {
                write_purchase(&mut out, purchase);
            }
            for payment in ledger.payments().data().cloned().unwrap_or_default() {
                let _ = writeln!(
                    out,
                    "  payment {:>5}  {:>10.2}  {}  {}",
                    payment.id,
                    payment.amount,
                    payment.method,
                    payment.note.as_deref().unwrap_or("")
                );
            }
        }
        Command::Pay { purchase_id, form } => {
            let mut ledger = PurchaseLedger::open(dispatcher, purchase_id);
            ledger.settled().await;
            let payment = ledger.pay(&form).await?;
            let _ = writeln!(out, "registered payment {} of {:.2}", payment.id, payment.amount);
            if let Some(purchase) = ledger.purchase().data() {
                write_purchase(&mut out, purchase);
            }
        }
        Command::Simulate { total, count } => {
            let mut planner = InstallmentPlanner::open(dispatcher);
            planner.edit(|form| {
                form.installment_enabled = true;
                form.total_amount = total;
                form.installment_count = count;
            });
            if !planner.is_simulating() {
                return Err(usage("total and count must both be greater than 0"));
            }
            let view = planner.settled().await;
            check(&view)?;
            if let Some(plan) = view.data() {
                let _ = writeln!(
                    out,
                    "{} installments of {:.2} (total {:.2})",
                    plan.installment_count, plan.installment_amount, plan.total_amount
                );
            }
        }
    }
    Ok(out)
}

/// A failed query fails the command, even when older data is cached.
fn check<T>(view: &QueryView<T>) -> Result<(), ClientError> {
    match &view.error {
        Some(error) if view.is_error() => Err(error.clone().into()),
        _ => Ok(()),
    }
}

fn write_purchase(out: &mut String, purchase: &Purchase) {
    let _ = writeln!(
        out,
        "{:>5}  {:<24} {:>10.2} paid {:>10.2} due {:>10.2}  {}",
        purchase.id,
        purchase.description,
        purchase.total_amount,
        purchase.paid_amount,
        purchase.remaining_amount,
        purchase.status
    );
}
