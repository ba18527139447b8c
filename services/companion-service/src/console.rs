use domain::order::fields;
use domain::Order;
use order_store::{InMemoryOrderStore, OrderStore};
use order_sync::OrderSyncDispatcher;
use std::fmt::Write;
use thiserror::Error;
use tracing::{info, warn};

pub const HELP: &str = "\
Commands:
  list                        active orders
  history                     delivered orders
  show <id>                   one order
  advance <id>                move an order to its next status
  add <id> <date> <total>     create an order in preparation
  remove <id>                 delete every document for an order
  metrics                     dump prometheus metrics
  help                        this text
  quit                        stop the service";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}', type 'help'")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Operator command read from stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    History,
    Show(String),
    Advance(String),
    Add {
        id: String,
        date: String,
        total: String,
    },
    Remove(String),
    Metrics,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (name, args.as_slice()) {
            ("list", []) => Command::List,
            ("history", []) => Command::History,
            ("show", [id]) => Command::Show(id.to_string()),
            ("show", _) => return Err(CommandError::Usage("show <id>")),
            ("advance", [id]) => Command::Advance(id.to_string()),
            ("advance", _) => return Err(CommandError::Usage("advance <id>")),
            ("add", [id, date, total]) => Command::Add {
                id: id.to_string(),
                date: date.to_string(),
                total: total.to_string(),
            },
            ("add", _) => return Err(CommandError::Usage("add <id> <date> <total>")),
            ("remove", [id]) => Command::Remove(id.to_string()),
            ("remove", _) => return Err(CommandError::Usage("remove <id>")),
            ("metrics", []) => Command::Metrics,
            ("help", _) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            _ => return Err(CommandError::Unknown(line.trim().to_string())),
        };

        Ok(Some(command))
    }
}

fn render_orders<'a>(out: &mut String, heading: &str, orders: impl Iterator<Item = &'a Order>) {
    let _ = writeln!(out, "{}:", heading);
    let mut empty = true;
    for order in orders {
        empty = false;
        let _ = writeln!(out, "  {}", render_order(order));
    }
    if empty {
        let _ = writeln!(out, "  (none)");
    }
}

fn render_order(order: &Order) -> String {
    format!(
        "#{:<6} {:<11} {:<16} {}",
        order.id,
        order.date,
        order.status.as_str(),
        order.total
    )
}

/// Executes operator commands against the running dispatcher and the
/// backing store
pub struct Console {
    store: InMemoryOrderStore,
    collection: String,
}

impl Console {
    pub fn new(store: InMemoryOrderStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Run a command and return the text to show the operator
    pub async fn execute(&self, dispatcher: &OrderSyncDispatcher, command: Command) -> String {
        let mut out = String::new();

        match command {
            Command::List => {
                render_orders(&mut out, "Active orders", dispatcher.orders().active());
            }
            Command::History => {
                render_orders(&mut out, "Order history", dispatcher.orders().history());
            }
            Command::Show(id) => match dispatcher.orders().find(&id) {
                Some(order) => out.push_str(&render_order(order)),
                None => {
                    let _ = write!(out, "Order #{} not found", id);
                }
            },
            Command::Advance(id) => match dispatcher.advance_status(&id) {
                Some(next) => {
                    let _ = write!(out, "Order #{} moving to {}", id, next);
                }
                None => {
                    let _ = write!(out, "Order #{} not found", id);
                }
            },
            Command::Add { id, date, total } => {
                let order = Order::new(id.clone(), date, domain::OrderStatus::Preparing, total);
                let handle = self.store.insert(&self.collection, order);
                info!(order_id = %id, document = %handle, "Order added from console");
                let _ = write!(out, "Order #{} added", id);
            }
            Command::Remove(id) => {
                let removed = self.remove_order(&id).await;
                let _ = write!(out, "Removed {} document(s) for order #{}", removed, id);
            }
            Command::Metrics => match common::metrics::gather_metrics() {
                Ok(text) => out.push_str(&text),
                Err(e) => {
                    let _ = write!(out, "Failed to gather metrics: {}", e);
                }
            },
            Command::Help => out.push_str(HELP),
            Command::Quit => out.push_str("Bye"),
        }

        out
    }

    async fn remove_order(&self, order_id: &str) -> usize {
        let handles = match self
            .store
            .query_by_field(&self.collection, fields::ID, order_id)
            .await
        {
            Ok(handles) => handles,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "Lookup for removal failed");
                return 0;
            }
        };

        let mut removed = 0;
        for handle in &handles {
            match self.store.remove(handle) {
                Ok(_) => removed += 1,
                Err(e) => warn!(document = %handle, error = %e, "Remove failed"),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderStatus;
    use notifier::RecordingSink;
    use order_sync::DispatcherConfig;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("list"), Ok(Some(Command::List)));
        assert_eq!(Command::parse("  history "), Ok(Some(Command::History)));
        assert_eq!(
            Command::parse("advance 004"),
            Ok(Some(Command::Advance("004".to_string())))
        );
        assert_eq!(
            Command::parse("add 010 01/11/2025 $5.000"),
            Ok(Some(Command::Add {
                id: "010".to_string(),
                date: "01/11/2025".to_string(),
                total: "$5.000".to_string(),
            }))
        );
        assert_eq!(Command::parse("exit"), Ok(Some(Command::Quit)));
        assert_eq!(Command::parse(""), Ok(None));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            Command::parse("advance"),
            Err(CommandError::Usage("advance <id>"))
        );
        assert_eq!(
            Command::parse("add 010 01/11/2025"),
            Err(CommandError::Usage("add <id> <date> <total>"))
        );
        assert_eq!(
            Command::parse("ship 004"),
            Err(CommandError::Unknown("ship 004".to_string()))
        );
    }

    async fn running(store: &InMemoryOrderStore) -> OrderSyncDispatcher {
        let mut dispatcher = OrderSyncDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(store.clone()),
            Arc::new(RecordingSink::new()),
        );
        let mut rx = dispatcher.watch_orders();
        dispatcher.start().await.unwrap();
        let expected = store.documents("pedidos");
        while *rx.borrow_and_update() != expected {
            rx.changed().await.unwrap();
        }
        dispatcher
    }

    #[tokio::test]
    async fn test_list_and_history_render_view() {
        let store = InMemoryOrderStore::with_orders(
            "pedidos",
            vec![
                Order::new("001", "20/10/2025", OrderStatus::Preparing, "$12.000"),
                Order::new("004", "15/10/2025", OrderStatus::Delivered, "$25.000"),
            ],
        );
        let mut dispatcher = running(&store).await;
        let console = Console::new(store, "pedidos");

        let list = console.execute(&dispatcher, Command::List).await;
        assert!(list.contains("#001"));
        assert!(!list.contains("#004"));

        let history = console.execute(&dispatcher, Command::History).await;
        assert!(history.contains("#004"));
        assert!(history.contains("Entregado"));

        let missing = console.execute(&dispatcher, Command::Show("999".into())).await;
        assert_eq!(missing, "Order #999 not found");

        dispatcher.stop().await;
    }

    #[tokio::test]
    async fn test_add_and_remove_go_through_store() {
        let store = InMemoryOrderStore::new();
        let mut dispatcher = running(&store).await;
        let console = Console::new(store.clone(), "pedidos");

        let mut rx = dispatcher.watch_orders();
        console
            .execute(
                &dispatcher,
                Command::Add {
                    id: "010".into(),
                    date: "01/11/2025".into(),
                    total: "$5.000".into(),
                },
            )
            .await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while dispatcher.orders().find("010").is_none() {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        let out = console.execute(&dispatcher, Command::Remove("010".into())).await;
        assert_eq!(out, "Removed 1 document(s) for order #010");
        assert!(store.documents("pedidos").is_empty());

        dispatcher.stop().await;
    }
}
