use async_trait::async_trait;
use colored::*;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Publisher;
use crate::error::Result;
use crate::types::DeliveryId;

/// Prints alerts to stdout instead of posting them
#[derive(Debug, Default)]
pub struct ConsolePublisher {
    printed: AtomicU64,
}

impl ConsolePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn printed(&self) -> u64 {
        self.printed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for ConsolePublisher {
    fn name(&self) -> &str {
        "console"
    }

    async fn publish(&self, destination: &str, text: &str) -> Result<DeliveryId> {
        let n = self.printed.fetch_add(1, Ordering::SeqCst) + 1;

        println!("{} {}", "📝 Alert for".bright_white().bold(), destination.cyan());
        for line in text.lines().filter(|l| !l.is_empty()) {
            println!("   {}", line.bright_yellow());
        }
        println!("{}", "─".repeat(80).bright_black());

        tracing::info!(destination, "alert printed to console");
        Ok(DeliveryId(format!("console-{}", n)))
    }
}
