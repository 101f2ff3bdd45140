use chrono::Local;
use std::path::PathBuf;

use parq_protocol::{
    ContactMessage, NewPaymentMethod, NewReservation, ProfileUpdate, RegisterRequest,
    WalletDeposit, WalletPayment,
};

use crate::auth::AuthService;
use crate::client::ApiClient;
use crate::config::{default_config_path, CliConfig};
use crate::contacts::ContactsService;
use crate::error::{ErrorCode, ParqError, Result};
use crate::guard::{GuardDecision, RouteGuard};
use crate::notifications::NotificationsService;
use crate::parking::ParkingService;
use crate::payments::PaymentsService;
use crate::subscriptions::SubscriptionsService;
use crate::ui::UI;
use crate::{
    BlockerCommand, Commands, ConfigCommand, ContactArgs, LoginArgs, MethodsCommand,
    NotifyCommand, ParkingCommand, PaymentsCommand, ProfileCommand, RegisterArgs, SubsCommand,
    TariffsCommand, WalletCommand,
};

/// CLI handler for processing commands
pub struct CliHandler {
    config_path: Option<PathBuf>,
    ui: UI,
}

impl CliHandler {
    /// Create a new CLI handler with an optional custom config path
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            ui: UI::new(),
        }
    }

    /// Load configuration using the handler's config path
    async fn load_config(&self) -> Result<CliConfig> {
        CliConfig::load(self.config_path.as_deref()).await
    }

    /// Build an API client without any auth requirement
    async fn client(&self) -> Result<ApiClient> {
        let config = self.load_config().await?;
        ApiClient::new(config.to_client_config()?)
    }

    /// Build an API client for a protected command
    ///
    /// The route guard runs first, on the stored record alone; only then is
    /// the session bootstrapped.
    async fn authed_client(&self, return_to: &str) -> Result<ApiClient> {
        let client = self.client().await?;

        match RouteGuard::check(client.session(), return_to) {
            GuardDecision::RedirectToLogin { return_to } => {
                self.ui.warning("Sign-in required.");
                self.ui.info(&format!(
                    "Run `parq login <username>`, then `parq {}` to continue.",
                    return_to
                ));
                Err(ParqError::session_not_found("Not signed in"))
            }
            GuardDecision::Proceed => {
                client.initialize().await;
                Ok(client)
            }
        }
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        let result = self.dispatch(command).await;

        if let Err(e) = &result {
            if let Some(hint) = e.connection_hint() {
                self.ui.warning(hint);
            } else if matches!(
                e.code(),
                ErrorCode::TokenExpired | ErrorCode::RefreshRejected
            ) {
                self.ui
                    .warning("Your session has expired. Run `parq login` to sign in again.");
            }
        }

        result
    }

    async fn dispatch(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login(args) => self.handle_login(args).await,
            Commands::Register(args) => self.handle_register(args).await,
            Commands::Logout => self.handle_logout().await,
            Commands::Status => self.handle_status().await,
            Commands::Profile(args) => self.handle_profile(args.command).await,
            Commands::Parking(args) => self.handle_parking(args.command).await,
            Commands::Payments(args) => self.handle_payments(args.command).await,
            Commands::Subs(args) => self.handle_subs(args.command).await,
            Commands::Tariffs(args) => self.handle_tariffs(args.command).await,
            Commands::Contact(args) => self.handle_contact(args).await,
            Commands::Notify(args) => self.handle_notify(args.command).await,
            Commands::Config(args) => self.handle_config(args.command).await,
        }
    }

    // --- Auth commands ---

    async fn handle_login(&mut self, args: LoginArgs) -> Result<()> {
        let password = match args.password {
            Some(password) => password,
            None => dialoguer::Password::new()
                .with_prompt("Password")
                .interact()?,
        };

        let service = AuthService::new(self.client().await?);
        let user = service.login(args.username, password).await?;

        self.ui
            .success(&format!("Signed in as {} <{}>", user.username, user.email));
        Ok(())
    }

    async fn handle_register(&mut self, args: RegisterArgs) -> Result<()> {
        let password = match args.password {
            Some(password) => password,
            None => dialoguer::Password::new()
                .with_prompt("Password")
                .with_confirmation("Confirm password", "Passwords do not match")
                .interact()?,
        };

        let request = RegisterRequest {
            username: args.username,
            email: args.email,
            password,
            car_number: args.car_number,
            car_model: args.car_model,
        };

        let service = AuthService::new(self.client().await?);
        let user = service.register(request).await?;

        self.ui
            .success(&format!("Account created; signed in as {}", user.username));
        Ok(())
    }

    async fn handle_logout(&mut self) -> Result<()> {
        let client = self.client().await?;
        client.initialize().await;

        let service = AuthService::new(client);
        service.logout().await?;

        self.ui.success("Signed out.");
        Ok(())
    }

    async fn handle_status(&mut self) -> Result<()> {
        let service = AuthService::new(self.client().await?);
        let status = service.status().await;

        let mut rows = vec![
            ("Version", status.version.clone()),
            (
                "Authentication",
                self.ui.format_auth_status(status.authenticated),
            ),
        ];

        if status.authenticated {
            rows.push(("Username", self.ui.format_user_field(status.username)));
            rows.push(("Email", self.ui.format_user_field(status.email)));
        }

        rows.push((
            "Server",
            if status.server_connected {
                self.ui.format_server_status(true)
            } else {
                format!(
                    "{} ({})",
                    self.ui.format_server_status(false),
                    status.server_status_msg
                )
            },
        ));

        self.ui.card("Status", rows);
        Ok(())
    }

    async fn handle_profile(&mut self, command: ProfileCommand) -> Result<()> {
        let client = self.authed_client("profile show").await?;
        let service = AuthService::new(client);

        match command {
            ProfileCommand::Show => {
                let user = service.me().await?;
                self.ui.card(
                    "Profile",
                    vec![
                        ("Username", user.username),
                        ("Email", user.email),
                        ("Car number", self.ui.format_user_field(user.car_number)),
                        ("Car model", self.ui.format_user_field(user.car_model)),
                        ("Avatar", self.ui.format_user_field(user.avatar_url)),
                    ],
                );
            }
            ProfileCommand::Update {
                username,
                email,
                car_number,
                car_model,
                avatar,
            } => {
                let current = service.me().await?;
                let update = ProfileUpdate {
                    username: username.unwrap_or(current.username),
                    email: email.unwrap_or(current.email),
                    car_number: car_number
                        .or(current.car_number)
                        .unwrap_or_default(),
                    car_model: car_model.or(current.car_model).unwrap_or_default(),
                };

                let user = service.update_profile(update, avatar.as_deref()).await?;
                self.ui
                    .success(&format!("Profile updated for {}", user.username));
            }
        }
        Ok(())
    }

    // --- Parking commands ---

    async fn handle_parking(&mut self, command: ParkingCommand) -> Result<()> {
        let client = self.authed_client("parking").await?;
        let service = ParkingService::new(client);

        match command {
            ParkingCommand::Spots { free } => {
                let mut spots = service.spots().await?;
                if free {
                    spots.retain(|s| s.is_free());
                }

                if spots.is_empty() {
                    self.ui.info("No spots to show.");
                    return Ok(());
                }

                let free_count = spots.iter().filter(|s| s.is_free()).count();
                self.ui.header("Parking spots");
                for spot in &spots {
                    let state = if spot.is_lock {
                        "locked"
                    } else if spot.is_occupied {
                        "occupied"
                    } else {
                        "free"
                    };
                    let blocker = if spot.is_blocker_raised {
                        "blocker up"
                    } else {
                        "blocker down"
                    };
                    println!("{:<12} {:<24} {:<10} {}", spot.reference, spot.name, state, blocker);
                }
                self.ui.separator();
                self.ui
                    .info(&format!("{} free of {} shown", free_count, spots.len()));
            }
            ParkingCommand::Windows { spot, date } => {
                let date = date.unwrap_or_else(|| Local::now().date_naive());
                let windows = service.available_windows(&spot, date).await?;

                if windows.is_empty() {
                    self.ui
                        .info(&format!("No windows for {} on {}", spot, date));
                    return Ok(());
                }

                self.ui.header(&format!("Windows for {} on {}", spot, date));
                for window in &windows {
                    let state = if window.is_blocked() {
                        window.reason.as_deref().unwrap_or("blocked")
                    } else {
                        "available"
                    };
                    println!("{} - {}  {}", window.start_time, window.end_time, state);
                }
            }
            ParkingCommand::Reserve { spot, start, end } => {
                let reservation = service
                    .reserve(NewReservation {
                        parking_spot: spot,
                        start_time: start,
                        end_time: end,
                    })
                    .await?;

                self.ui.success(&format!(
                    "Reservation {} created ({} - {})",
                    reservation.id, reservation.start_time, reservation.end_time
                ));
                if let Some(price) = reservation.total_price {
                    self.ui.info(&format!(
                        "Price: {:.2}. Pay with `parq payments pay {} --amount {:.2} --wallet`",
                        price, reservation.id, price
                    ));
                }
            }
            ParkingCommand::List { status } => {
                let mut reservations = service.reservations().await?;
                if let Some(status) = &status {
                    reservations.retain(|r| r.status.as_deref() == Some(status.as_str()));
                }
                reservations.sort_by(|a, b| a.start_time.cmp(&b.start_time));

                if reservations.is_empty() {
                    self.ui.info("No reservations.");
                    return Ok(());
                }

                self.ui.header("Reservations");
                for r in &reservations {
                    println!(
                        "#{:<6} {:<12} {} - {}  {}",
                        r.id,
                        r.spot_name.as_deref().unwrap_or(&r.parking_spot),
                        r.start_time,
                        r.end_time,
                        r.status.as_deref().unwrap_or("-")
                    );
                }
            }
            ParkingCommand::Cancel { id } => {
                service.cancel(id).await?;
                self.ui.success(&format!("Reservation {} cancelled.", id));
            }
            ParkingCommand::Blocker { command } => match command {
                BlockerCommand::Raise { spot } => {
                    service.raise_blocker(&spot).await?;
                    self.ui.success(&format!("Blocker raised on {}.", spot));
                }
                BlockerCommand::Lower { spot } => {
                    service.lower_blocker(&spot).await?;
                    self.ui.success(&format!("Blocker lowered on {}.", spot));
                }
            },
        }
        Ok(())
    }

    // --- Payments commands ---

    async fn handle_payments(&mut self, command: PaymentsCommand) -> Result<()> {
        let client = self.authed_client("payments").await?;
        let service = PaymentsService::new(client);

        match command {
            PaymentsCommand::Methods { command } => match command {
                MethodsCommand::List => {
                    let methods = service.methods().await?;
                    if methods.is_empty() {
                        self.ui.info("No payment methods stored.");
                        return Ok(());
                    }
                    self.ui.header("Payment methods");
                    for m in &methods {
                        println!(
                            "#{:<4} {:<12} •••• {}  exp {}  {}{}",
                            m.id,
                            m.kind,
                            m.card_number,
                            m.expiry_date,
                            m.cardholder_name,
                            if m.is_default { "  (default)" } else { "" }
                        );
                    }
                }
                MethodsCommand::Add {
                    kind,
                    card_number,
                    expiry,
                    name,
                    cvv,
                    default,
                } => {
                    let cvv = match cvv {
                        Some(cvv) => cvv,
                        None => dialoguer::Password::new().with_prompt("CVV").interact()?,
                    };

                    let method = service
                        .add_method(NewPaymentMethod {
                            kind,
                            card_number: card_number.replace(' ', ""),
                            expiry_date: expiry,
                            cvv,
                            cardholder_name: name,
                            is_default: default,
                        })
                        .await?;
                    self.ui
                        .success(&format!("Payment method #{} added.", method.id));
                }
                MethodsCommand::Remove { id } => {
                    service.delete_method(id).await?;
                    self.ui.success(&format!("Payment method #{} removed.", id));
                }
                MethodsCommand::SetDefault { id } => {
                    service.set_default_method(id).await?;
                    self.ui
                        .success(&format!("Payment method #{} is now the default.", id));
                }
            },
            PaymentsCommand::Wallet { command } => match command {
                WalletCommand::Info => {
                    let wallet = service.wallet().await?;
                    self.ui.card(
                        "Wallet",
                        vec![
                            ("Balance", format!("{:.2}", wallet.balance)),
                            ("Updated", wallet.updated_at),
                        ],
                    );
                }
                WalletCommand::Deposit { amount, method } => {
                    let wallet = service
                        .deposit(WalletDeposit {
                            amount,
                            payment_method_id: method,
                            description: Some("Wallet top-up".to_string()),
                        })
                        .await?;
                    self.ui.success(&format!(
                        "Deposited {:.2}; balance is now {:.2}.",
                        amount, wallet.balance
                    ));
                }
            },
            PaymentsCommand::Pay {
                reservation,
                amount,
                method,
                wallet,
            } => {
                if wallet {
                    service
                        .pay_with_wallet(WalletPayment {
                            amount,
                            reservation_id: reservation,
                            description: Some("Parking reservation payment".to_string()),
                        })
                        .await?;
                } else if let Some(method) = method {
                    service
                        .pay_with_card(parq_protocol::CardPayment {
                            amount,
                            payment_method_id: method,
                            reservation_id: reservation,
                            description: Some("Parking reservation payment".to_string()),
                        })
                        .await?;
                } else {
                    return Err(ParqError::invalid_input(
                        "Choose a payment source: --wallet or --method <id>",
                    ));
                }
                self.ui
                    .success(&format!("Reservation {} paid.", reservation));
            }
            PaymentsCommand::Transactions => {
                let transactions = service.transactions().await?;
                if transactions.is_empty() {
                    self.ui.info("No transactions.");
                    return Ok(());
                }
                self.ui.header("Transactions");
                for t in &transactions {
                    println!(
                        "{:<24} {:>10.2}  {:<10} {}",
                        t.created_at,
                        t.amount,
                        t.status,
                        t.transaction_type.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Ok(())
    }

    // --- Subscription commands ---

    async fn handle_subs(&mut self, command: SubsCommand) -> Result<()> {
        let client = self.authed_client("subs").await?;
        let service = SubscriptionsService::new(client);

        match command {
            SubsCommand::Plans => {
                let plans = service.plans().await?;
                self.ui.header("Subscription plans");
                for plan in &plans {
                    println!(
                        "#{:<4} {:<20} {:>4} days  {:>10.2}  -{}%",
                        plan.id, plan.name, plan.duration_days, plan.price, plan.discount_percentage
                    );
                }
            }
            SubsCommand::Active => match service.active().await? {
                Some(sub) => {
                    self.ui.card(
                        "Active subscription",
                        vec![
                            ("Plan", sub.plan_details.name),
                            (
                                "Discount",
                                format!("{}%", sub.plan_details.discount_percentage),
                            ),
                            ("Until", sub.end_date),
                            ("Auto-renew", sub.auto_renew.to_string()),
                        ],
                    );
                }
                None => self.ui.info("No active subscription."),
            },
            SubsCommand::Purchase {
                plan,
                method,
                auto_renew,
            } => {
                let sub = service
                    .purchase(parq_protocol::PurchaseSubscription {
                        plan_id: plan,
                        payment_method_id: method,
                        auto_renew,
                    })
                    .await?;
                self.ui.success(&format!(
                    "Subscribed to {} until {}.",
                    sub.plan_details.name, sub.end_date
                ));
            }
            SubsCommand::Cancel => match service.active().await? {
                Some(sub) => {
                    service.cancel(sub.id).await?;
                    self.ui.success("Subscription cancelled.");
                }
                None => self.ui.info("No active subscription to cancel."),
            },
        }
        Ok(())
    }

    async fn handle_tariffs(&mut self, command: TariffsCommand) -> Result<()> {
        let client = self.authed_client("tariffs").await?;
        let service = SubscriptionsService::new(client);

        match command {
            TariffsCommand::Zones => {
                let zones = service.zones().await?;
                self.ui.header("Tariff zones");
                for zone in &zones {
                    println!(
                        "#{:<4} {:<20} {}",
                        zone.id,
                        zone.name,
                        zone.description.as_deref().unwrap_or("")
                    );
                }
            }
            TariffsCommand::Rules { zone } => {
                let rules = service.rules(zone).await?;
                if rules.is_empty() {
                    self.ui.info("No rules for this zone.");
                    return Ok(());
                }
                self.ui.header("Tariff rules");
                for rule in &rules {
                    println!(
                        "{:<24} {:<12} {:<10} {:>8.2}/h",
                        rule.name, rule.time_period, rule.day_type, rule.price_per_hour
                    );
                }
            }
        }
        Ok(())
    }

    // --- Misc commands ---

    async fn handle_contact(&mut self, args: ContactArgs) -> Result<()> {
        let client = self.authed_client("contact").await?;
        let service = ContactsService::new(client);

        service
            .send(ContactMessage {
                name: args.name,
                email: args.email,
                message: args.message,
            })
            .await?;

        self.ui.success("Message sent. We'll get back to you soon.");
        Ok(())
    }

    async fn handle_notify(&mut self, command: NotifyCommand) -> Result<()> {
        let client = self.authed_client("notify").await?;
        let service = NotificationsService::new(client);

        match command {
            NotifyCommand::Subscribe {
                endpoint,
                p256dh,
                auth,
            } => {
                service.subscribe(endpoint, p256dh, auth).await?;
                self.ui.success("Push subscription registered.");
            }
            NotifyCommand::Key => {
                println!("{}", service.vapid_public_key()?);
            }
        }
        Ok(())
    }

    async fn handle_config(&mut self, command: ConfigCommand) -> Result<()> {
        let path = self
            .config_path
            .clone()
            .unwrap_or_else(default_config_path);
        let mut config = self.load_config().await?;

        match command {
            ConfigCommand::Show => {
                self.ui.card(
                    "Configuration",
                    vec![
                        ("Endpoint", config.endpoint.clone()),
                        ("Timeout", format!("{}s", config.timeout)),
                        ("Verbose", config.verbose.to_string()),
                        (
                            "Storage dir",
                            config.storage_dir.display().to_string(),
                        ),
                        (
                            "Token storage",
                            config.token_storage_enabled.to_string(),
                        ),
                        (
                            "VAPID key",
                            self.ui
                                .format_user_field(config.vapid_public_key.clone()),
                        ),
                    ],
                );
                return Ok(());
            }
            ConfigCommand::SetEndpoint { url } => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ParqError::invalid_endpoint(url));
                }
                config.endpoint = url;
            }
            ConfigCommand::SetTimeout { seconds } => {
                if seconds == 0 {
                    return Err(ParqError::invalid_input("Timeout must be positive"));
                }
                config.timeout = seconds;
            }
            ConfigCommand::SetVerbose { enabled } => {
                config.verbose = matches!(enabled.as_str(), "true" | "on" | "1" | "yes");
            }
            ConfigCommand::SetVapidKey { key } => {
                config.vapid_public_key = Some(key);
            }
            ConfigCommand::Reset => {
                config = CliConfig::default();
            }
        }

        config.save(&path).await?;
        self.ui.success("Configuration saved.");
        Ok(())
    }
}