//! Posts command - browse and manage posts.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use educamais_client::{
    ApiClient, AuthScope, Paginated, Pagination, Post, PostInput, Validate,
};
use educamais_query::FEED_PAGE_SIZE;

use super::{Context, settle_session};

/// Arguments for the posts command.
#[derive(Args, Debug)]
pub struct PostsArgs {
    #[command(subcommand)]
    pub command: PostsCommand,
}

#[derive(Subcommand, Debug)]
pub enum PostsCommand {
    /// Show the newest posts, loading pages one after another
    Feed {
        /// Only posts matching this text
        #[arg(short, long)]
        search: Option<String>,

        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: usize,
    },

    /// Show a single page of posts
    List {
        /// Page number (starting at 1)
        #[arg(long, default_value = "1")]
        page: u32,

        /// Posts per page
        #[arg(short, long, default_value_t = FEED_PAGE_SIZE)]
        limit: u32,

        /// Only posts matching this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show a post
    Show {
        /// Post ID
        id: u64,
    },

    /// Publish a post (teachers only)
    Create {
        /// Post title
        #[arg(long)]
        title: String,

        /// Post content
        #[arg(long)]
        body: String,

        /// Short description shown in lists
        #[arg(long)]
        summary: Option<String>,
    },

    /// Edit a post (teachers only)
    Update {
        /// Post ID
        id: u64,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New content
        #[arg(long)]
        body: Option<String>,

        /// New description
        #[arg(long)]
        summary: Option<String>,
    },

    /// Delete a post (teachers only)
    Delete {
        /// Post ID
        id: u64,
    },
}

/// Run the posts command.
pub async fn run(args: PostsArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;

    let result = match args.command {
        PostsCommand::Feed { search, pages } => cmd_feed(ctx, &client, search, pages).await,
        PostsCommand::List {
            page,
            limit,
            search,
        } => cmd_list(ctx, &client, page, limit, search).await,
        PostsCommand::Show { id } => cmd_show(ctx, &client, id).await,
        PostsCommand::Create {
            title,
            body,
            summary,
        } => {
            let mut input = PostInput::new(title, body);
            if let Some(summary) = summary {
                input = input.with_summary(summary);
            }
            cmd_create(ctx, &client, input).await
        }
        PostsCommand::Update {
            id,
            title,
            body,
            summary,
        } => cmd_update(ctx, &client, id, title, body, summary).await,
        PostsCommand::Delete { id } => cmd_delete(ctx, &client, id).await,
    };
    settle_session(&client, result).await
}

async fn cmd_feed(
    ctx: &Context,
    client: &ApiClient,
    search: Option<String>,
    pages: usize,
) -> Result<()> {
    let queries = ctx.queries(client);
    let feed = queries.infinite(search.as_deref());

    feed.fetch_next_page().await?;
    while feed.pages_loaded() < pages.max(1) && feed.has_next_page() {
        feed.fetch_next_page().await?;
    }

    let posts = feed.posts();
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    if posts.is_empty() {
        print_empty(search.as_deref());
        return Ok(());
    }

    print_header(search.as_deref(), "Feed");
    for post in &posts {
        print_post_line(post);
    }

    let dim = Style::new().dim();
    println!();
    if feed.has_next_page() {
        println!(
            "{}",
            dim.apply_to(format!(
                "{} pages loaded, more available (use --pages {})",
                feed.pages_loaded(),
                feed.pages_loaded() + 1
            ))
        );
    } else {
        println!("{}", dim.apply_to("End of feed"));
    }
    Ok(())
}

async fn cmd_list(
    ctx: &Context,
    client: &ApiClient,
    page: u32,
    limit: u32,
    search: Option<String>,
) -> Result<()> {
    if page == 0 || limit == 0 {
        bail!("--page and --limit must be at least 1");
    }

    let queries = ctx.queries(client);
    let result = queries.list(page, limit, search.as_deref()).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.data.is_empty() {
        print_empty(search.as_deref());
        return Ok(());
    }

    print_header(search.as_deref(), "Posts");
    for post in &result.data {
        print_post_line(post);
    }
    println!();
    println!("{}", Style::new().dim().apply_to(page_footer(&result, page)));
    Ok(())
}

async fn cmd_show(ctx: &Context, client: &ApiClient, id: u64) -> Result<()> {
    let post = ctx.queries(client).detail(id).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&post)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style(&post.title).bold());
    println!(
        "{}",
        dim.apply_to(format!(
            "#{} by {} on {}",
            post.id,
            post.author_name(),
            post.created_at.format("%Y-%m-%d %H:%M")
        ))
    );
    if post.is_edited() {
        println!(
            "{}",
            dim.apply_to(format!(
                "edited {}",
                post.updated_at.format("%Y-%m-%d %H:%M")
            ))
        );
    }
    if let Some(summary) = post.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        println!();
        println!("{}", style(summary).italic());
    }
    println!();
    println!("{}", post.body);
    Ok(())
}

async fn cmd_create(ctx: &Context, client: &ApiClient, input: PostInput) -> Result<()> {
    input.validate()?;
    require_teacher(client).await?;

    let post = ctx.queries(client).create(&input).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        println!(
            "{} Post created: {}",
            Style::new().green().apply_to("✓"),
            Style::new().dim().apply_to(format!("#{}", post.id))
        );
    }
    Ok(())
}

async fn cmd_update(
    ctx: &Context,
    client: &ApiClient,
    id: u64,
    title: Option<String>,
    body: Option<String>,
    summary: Option<String>,
) -> Result<()> {
    if title.is_none() && body.is_none() && summary.is_none() {
        bail!("Nothing to update: pass --title, --body or --summary");
    }
    require_teacher(client).await?;

    let queries = ctx.queries(client);
    let current = queries.detail(id).await?;
    let input = merge_input(current, title, body, summary);
    input.validate()?;

    let post = queries.update(id, &input).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        println!(
            "{} Post updated: {}",
            Style::new().green().apply_to("✓"),
            Style::new().dim().apply_to(format!("#{}", post.id))
        );
    }
    Ok(())
}

async fn cmd_delete(ctx: &Context, client: &ApiClient, id: u64) -> Result<()> {
    require_teacher(client).await?;
    ctx.queries(client).remove(id).await?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("{} Post {} deleted", Style::new().green().apply_to("✓"), id);
    }
    Ok(())
}

/// Fail unless the stored session belongs to a teacher.
async fn require_teacher(client: &ApiClient) -> Result<()> {
    let scope = AuthScope::provide(client.auth());
    let context = scope.context();
    context.ready().await;

    if !context.is_signed_in() {
        bail!("Not signed in. Run 'educamais auth login <email>' first");
    }
    if !context.is_teacher() {
        bail!("Only teachers can publish, edit or delete posts");
    }
    Ok(())
}

/// Apply the given changes on top of an existing post.
fn merge_input(
    current: Post,
    title: Option<String>,
    body: Option<String>,
    summary: Option<String>,
) -> PostInput {
    PostInput {
        title: title.unwrap_or(current.title),
        body: body.unwrap_or(current.body),
        summary: summary.or(current.summary),
    }
}

fn print_header(search: Option<&str>, title: &str) {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(q) => println!("{} matching \"{}\"", style(title).bold(), q),
        None => println!("{}", style(title).bold()),
    }
    println!("{}", Style::new().dim().apply_to("─".repeat(60)));
}

fn print_post_line(post: &Post) {
    let dim = Style::new().dim();
    println!(
        "{} {}",
        Style::new().cyan().apply_to(format!("#{:<5}", post.id)),
        style(&post.title).bold()
    );
    println!(
        "       {}",
        dim.apply_to(format!(
            "{} · {}",
            post.author_name(),
            post.created_at.format("%Y-%m-%d")
        ))
    );
    println!("       {}", truncate(post.excerpt(), 70));
}

fn print_empty(search: Option<&str>) {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(q) => println!("No posts found for \"{}\".", q),
        None => println!("No posts yet."),
    }
}

fn page_footer(result: &Paginated<Post>, requested: u32) -> String {
    match result.pagination {
        Some(Pagination {
            page, pages, total, ..
        }) => format!("Page {} of {} ({} posts)", page, pages, total),
        None => format!("Page {}", requested),
    }
}

/// Shorten `s` to `max_len` characters on one line.
fn truncate(s: &str, max_len: usize) -> String {
    let line = s.lines().next().unwrap_or_default();
    if line.chars().count() <= max_len && line.trim_end() == s.trim_end() {
        line.to_string()
    } else {
        let kept: String = line.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept.trim_end())
    }
}
