//! SIMULATE command - Run one pin request through the handshake.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use pinflow_core::{
    ComponentName, Item, ItemId, ItemText, LaunchIntent, OptionValue, PackageName, RequestOptions,
    UserId,
};
use pinflow_request::{
    Collaborators, ConfirmIntent, DefaultLauncherLocator, LaunchError, PinRequestProcessor,
    ProcessorConfig, RecordingLauncher, ResultChannel, SessionTable, StaticDirectory, StringTable,
    ThreadCallerIdentity,
};
use pinflow_store::{ApproverKey, ItemStore, PinKey};
use serde::Serialize;

use super::{HumanReadable, output, yes_no};

/// Resource id the simulated publisher uses for its label.
const LABEL_RESOURCE_ID: u32 = 0x7f0b_0001;

/// Arguments for the simulate command.
#[derive(Args)]
pub struct SimulateArgs {
    /// Id of the item to pin
    #[arg(long, default_value = "compose")]
    pub item_id: String,

    /// Publisher package
    #[arg(long, default_value = "com.example.mail")]
    pub package: String,

    /// Approver (launcher) package
    #[arg(long, default_value = "com.example.launcher")]
    pub launcher: String,

    /// User the publisher runs as
    #[arg(long, default_value_t = UserId(0))]
    pub user: UserId,

    /// Profile parent of the publisher user, if it is a managed profile
    #[arg(long)]
    pub parent: Option<UserId>,

    /// Item label
    #[arg(long, default_value = "Compose")]
    pub label: String,

    /// Give the item an externalized label resolved at send time
    #[arg(long)]
    pub resource_label: bool,

    /// The publisher already lists the item as dynamic
    #[arg(long)]
    pub existing: bool,

    /// The existing item is disabled
    #[arg(long, requires = "existing")]
    pub disabled: bool,

    /// The approver already pins the existing item
    #[arg(long, requires = "existing")]
    pub already_pinned: bool,

    /// Leave out the mandatory label and intents
    #[arg(long)]
    pub incomplete: bool,

    /// No default launcher is configured
    #[arg(long)]
    pub no_launcher: bool,

    /// The confirmation activity fails to start
    #[arg(long)]
    pub fail_launch: bool,

    /// Do not accept the request as the approver
    #[arg(long)]
    pub skip_accept: bool,

    /// Delete the item between request and accept
    #[arg(long)]
    pub delete_before_accept: bool,

    /// Lock the publisher session between request and accept
    #[arg(long)]
    pub lock_before_accept: bool,

    /// Accept with an option value that cannot be transported
    #[arg(long)]
    pub foreign_option: bool,
}

/// Outcome of the request step.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Launched,
    AlreadyPinned,
    NotStarted,
    Rejected { error: String },
}

/// Outcome of the accept step.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AcceptOutcome {
    Skipped,
    Committed,
    NotCommitted,
    Rejected { error: String },
}

/// Everything observable after one run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub request_pin_supported: bool,
    pub request: RequestOutcome,
    pub confirm_intent: Option<ConfirmIntent>,
    pub accept: AcceptOutcome,
    pub result_delivered: bool,
    pub change_events: usize,
    pub outstanding_requests: usize,
    pub pinned_by_approver: bool,
    pub item: Option<Item>,
}

impl HumanReadable for SimulationReport {
    fn print_human(&self) {
        println!("{}", "Pin request simulation".bold());
        println!();
        println!(
            "  {} {}",
            "Supported:".cyan(),
            yes_no(self.request_pin_supported),
        );
        println!(
            "  {} {}",
            "Request:".cyan(),
            describe_request(&self.request),
        );
        if let Some(intent) = &self.confirm_intent {
            println!("  {} {}", "Surface:".cyan(), intent.component);
            println!("  {} {}", "Handle:".cyan(), intent.request.handle);
            let label = intent
                .request
                .item
                .short_label
                .as_ref()
                .and_then(ItemText::as_literal)
                .unwrap_or("<unresolved>");
            println!("  {} {}", "Label:".cyan(), label);
        }
        println!("  {} {}", "Accept:".cyan(), describe_accept(&self.accept));
        println!(
            "  {} {}",
            "Result delivered:".cyan(),
            yes_no(self.result_delivered),
        );
        println!("  {} {}", "Change events:".cyan(), self.change_events);
        println!("  {} {}", "Outstanding:".cyan(), self.outstanding_requests);
        println!("  {} {}", "Pinned:".cyan(), yes_no(self.pinned_by_approver));
        match &self.item {
            Some(item) => println!(
                "  {} {} (dynamic: {}, pinned: {}, enabled: {})",
                "Stored item:".cyan(),
                item.id,
                yes_no(item.dynamic),
                yes_no(item.pinned),
                yes_no(item.enabled)
            ),
            None => println!("  {} {}", "Stored item:".cyan(), "none".dimmed()),
        }
    }
}

fn describe_request(outcome: &RequestOutcome) -> colored::ColoredString {
    match outcome {
        RequestOutcome::Launched => "confirmation surface launched".green(),
        RequestOutcome::AlreadyPinned => "already pinned".green(),
        RequestOutcome::NotStarted => "not started".yellow(),
        RequestOutcome::Rejected { error } => format!("rejected: {error}").red(),
    }
}

fn describe_accept(outcome: &AcceptOutcome) -> colored::ColoredString {
    match outcome {
        AcceptOutcome::Skipped => "skipped".dimmed(),
        AcceptOutcome::Committed => "committed".green(),
        AcceptOutcome::NotCommitted => "not committed".yellow(),
        AcceptOutcome::Rejected { error } => format!("rejected: {error}").red(),
    }
}

fn candidate(args: &SimulateArgs) -> Item {
    let mut builder = Item::builder(args.package.as_str(), args.user, args.item_id.as_str());
    if !args.incomplete {
        let label = if args.resource_label {
            ItemText::resource(LABEL_RESOURCE_ID, "label")
        } else {
            ItemText::literal(args.label.clone())
        };
        builder = builder
            .short_label(label)
            .intent(LaunchIntent::new(format!("{}.OPEN", args.package)));
    }
    builder.build()
}

/// Execute the simulate command.
pub async fn execute(config: ProcessorConfig, human: bool, args: SimulateArgs) -> Result<()> {
    let approver_user = args.parent.unwrap_or(args.user);
    let package = PackageName::new(args.package.as_str());
    let item_id = ItemId::new(args.item_id.as_str());
    let approver = ApproverKey::new(args.launcher.as_str(), args.user, approver_user);

    let directory = StaticDirectory::new();
    if let Some(parent) = args.parent {
        directory.set_parent(args.user, parent);
    }
    if !args.no_launcher {
        directory.set_default_launcher(
            approver_user,
            Some(ComponentName::new(args.launcher.as_str(), "Home")),
        );
    }
    directory.set_confirmation_activity(
        approver_user,
        ComponentName::new(args.launcher.as_str(), "ConfirmPinItem"),
    );

    let launcher = Arc::new(RecordingLauncher::new());
    if args.fail_launch {
        launcher.set_failure(Some(LaunchError::ActivityNotFound(ComponentName::new(
            args.launcher.as_str(),
            "ConfirmPinItem",
        ))));
    }
    let sessions = Arc::new(SessionTable::with_unlocked([args.user, approver_user]));
    let strings = StringTable::new();
    strings.insert(
        args.package.as_str(),
        args.user,
        LABEL_RESOURCE_ID,
        args.label.clone(),
    );

    let store = Arc::new(ItemStore::new());
    let mut changes = store.changes().subscribe();
    let processor = PinRequestProcessor::new(
        Arc::clone(&store),
        Collaborators {
            locator: Arc::new(DefaultLauncherLocator::new(directory)),
            sessions: sessions.clone(),
            launcher: launcher.clone(),
            identity: Arc::new(ThreadCallerIdentity),
            resources: Arc::new(strings),
        },
        config,
    );

    if args.existing {
        let mut guard = store.lock()?;
        guard.upsert_dynamic(Item {
            enabled: !args.disabled,
            ..candidate(&args)
        });
        if args.already_pinned {
            guard.approver(approver.clone()).add_pin(&package, args.user, &item_id)?;
        }
    }

    let request_pin_supported = processor.is_request_pin_supported(args.user);
    let (channel, mut results) = ResultChannel::new();
    let request = match processor.request_pin(candidate(&args), Some(channel)) {
        Ok(true) => match launcher.last() {
            Some(_) => RequestOutcome::Launched,
            None => RequestOutcome::AlreadyPinned,
        },
        Ok(false) => RequestOutcome::NotStarted,
        Err(e) => RequestOutcome::Rejected {
            error: e.to_string(),
        },
    };
    let confirm_intent = launcher.last().map(|(intent, _)| intent);

    if args.delete_before_accept {
        store.lock()?.delete_dynamic(&package, args.user, &item_id);
    }
    if args.lock_before_accept {
        sessions.lock(args.user);
    }

    let accept = match &confirm_intent {
        Some(intent) if !args.skip_accept => {
            let handle = intent.request.handle;
            let options = if args.foreign_option {
                let host = OptionValue::Foreign {
                    type_name: "com.example.launcher.HostState".to_string(),
                };
                Some(RequestOptions::new().with("host", host))
            } else {
                None
            };
            let approver_side = processor.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                approver_side.accept(&handle, options.as_ref())
            })
            .await
            .context("approver task failed")?;
            match outcome {
                Ok(true) => AcceptOutcome::Committed,
                Ok(false) => AcceptOutcome::NotCommitted,
                Err(e) => AcceptOutcome::Rejected {
                    error: e.to_string(),
                },
            }
        }
        _ => AcceptOutcome::Skipped,
    };

    let mut change_events = 0;
    while changes.try_recv().is_ok() {
        change_events += 1;
    }

    let (item, pinned_by_approver) = {
        let guard = store.lock()?;
        let item = guard.find_by_id(&package, args.user, &item_id).cloned();
        let key = PinKey::new(package.clone(), args.user, item_id.clone());
        let pinned = guard
            .approver_record(&approver)
            .is_some_and(|record| record.contains(&key));
        (item, pinned)
    };

    let report = SimulationReport {
        request_pin_supported,
        request,
        confirm_intent,
        accept,
        result_delivered: results.try_recv().is_ok(),
        change_events,
        outstanding_requests: processor.outstanding_requests(),
        pinned_by_approver,
        item,
    };

    output(&report, human)
}
