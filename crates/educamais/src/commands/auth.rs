//! Auth command - sign in, sign up, sign out, status.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use educamais_client::{AuthScope, SignInRequest, SignUpRequest, User, Validate};

use super::Context;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in with email and password
    Login {
        /// Account email
        email: String,

        /// Password (prompted for when omitted)
        #[arg(long, env = "EDUCAMAIS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Signup {
        /// Account email
        email: String,

        /// Display name (defaults to the part of the email before '@')
        #[arg(long)]
        name: Option<String>,

        /// Password (prompted for when omitted)
        #[arg(long, env = "EDUCAMAIS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and remove the stored session
    Logout,

    /// Show the signed-in user
    Status,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { email, password } => cmd_login(ctx, email, password).await,
        AuthCommand::Signup {
            email,
            name,
            password,
        } => cmd_signup(ctx, email, name, password).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
        AuthCommand::Status => cmd_status(ctx).await,
    }
}

async fn cmd_login(ctx: &Context, email: String, password: Option<String>) -> Result<()> {
    let password = read_password(password, false)?;
    let request = SignInRequest::new(email, password);
    request.validate()?;

    let client = ctx.client()?;
    let scope = AuthScope::provide(client.auth());
    let user = scope.handle().sign_in(request).await?;

    print_signed_in(ctx, &user, "Signed in")
}

async fn cmd_signup(
    ctx: &Context,
    email: String,
    name: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let password = read_password(password, true)?;
    let mut request = SignUpRequest::new(email, password);
    if let Some(name) = name {
        request = request.with_name(name);
    }
    request.validate()?;

    let client = ctx.client()?;
    let scope = AuthScope::provide(client.auth());
    let user = scope.handle().sign_up(request).await?;

    print_signed_in(ctx, &user, "Account created")
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let scope = AuthScope::provide(client.auth());
    let handle = scope.handle();

    let was_signed_in = handle.check_session().await?.is_some();
    handle.logout().await?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "signed_out": was_signed_in }));
    } else if was_signed_in {
        println!("{} Signed out", Style::new().green().apply_to("✓"));
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

async fn cmd_status(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let scope = AuthScope::provide(client.auth());
    let context = scope.context();
    context.ready().await;
    let state = context.state();

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "signed_in": state.is_signed_in(),
                "teacher": state.is_teacher(),
                "student": state.is_student(),
                "user": state.user,
            }))?
        );
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Authentication Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));

    match &state.user {
        Some(user) => {
            println!("Signed in as {} <{}>", user.name, user.email);
            println!("  Role: {}", user.role.as_deref().unwrap_or("none"));
        }
        None => {
            println!("Not signed in");
            println!("  Run 'educamais auth login <email>' to sign in");
        }
    }

    if ctx.verbose {
        println!();
        println!("{}", dim.apply_to(format!("Server: {}", ctx.server_url)));
        println!(
            "{}",
            dim.apply_to(format!("Data dir: {}", ctx.data_dir.display()))
        );
    }
    Ok(())
}

fn print_signed_in(ctx: &Context, user: &User, verb: &str) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(user)?);
    } else {
        let greeting = user.first_name().unwrap_or(&user.email);
        println!(
            "{} {}. Welcome, {}!",
            Style::new().green().apply_to("✓"),
            verb,
            greeting
        );
    }
    Ok(())
}

/// Use the given password or prompt for it on the terminal.
fn read_password(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let password = rpassword::prompt_password("Password: ")?;
    if confirm {
        let again = rpassword::prompt_password("Confirm password: ")?;
        if again != password {
            bail!("Passwords do not match");
        }
    }
    Ok(password)
}
