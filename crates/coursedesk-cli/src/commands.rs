//! Command parsing and execution.

use anyhow::{anyhow, bail, Result};
use tracing::warn;

use coursedesk_core::api::courses::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use coursedesk_core::api::{ApiError, CourseClient};
use coursedesk_core::auth::{token, validate_login_input, Access, Route, RouteGuard, SessionManager};
use coursedesk_core::models::{Course, CourseCategory, CourseDraft, CourseFilter, CourseLevel};
use coursedesk_core::Config;

use crate::prompt;

pub const USAGE: &str = "\
Usage: coursedesk <command>

Commands:
  login [email]          Sign in (prompts for the password)
  logout                 Sign out and forget stored credentials
  status                 Show the current session
  courses [options]      List courses
      --page <n>         Page number (default 1)
      --search <text>    Filter by title
      --category <c>     Filter by category
      --level <l>        Filter by level
  show <id>              Show one course
  add                    Create a course
  edit <id>              Edit a course
  delete <id> [--yes]    Delete a course
  help                   Show this message";

/// Maximum title width in the course table
const TITLE_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Logout,
    Status,
    Courses { page: u32, filter: CourseFilter },
    Show { id: String },
    Add,
    Edit { id: String },
    Delete { id: String, confirmed: bool },
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        match name.as_str() {
            "login" => Ok(Command::Login {
                email: rest.first().cloned(),
            }),
            "logout" => Ok(Command::Logout),
            "status" => Ok(Command::Status),
            "courses" | "list" => Self::parse_courses(rest),
            "show" => Ok(Command::Show {
                id: Self::required_id(rest, "show")?,
            }),
            "add" | "create" => Ok(Command::Add),
            "edit" => Ok(Command::Edit {
                id: Self::required_id(rest, "edit")?,
            }),
            "delete" => Ok(Command::Delete {
                id: Self::required_id(rest, "delete")?,
                confirmed: rest.iter().any(|a| a == "--yes" || a == "-y"),
            }),
            "help" | "-h" | "--help" => Ok(Command::Help),
            other => bail!("Unknown command: {}", other),
        }
    }

    fn required_id(rest: &[String], command: &str) -> Result<String> {
        rest.iter()
            .find(|a| !a.starts_with('-'))
            .cloned()
            .ok_or_else(|| anyhow!("`{}` needs a course id", command))
    }

    fn parse_courses(rest: &[String]) -> Result<Self> {
        let mut page = DEFAULT_PAGE;
        let mut filter = CourseFilter::default();

        let mut iter = rest.iter();
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{} needs a value", flag))
            };
            match flag.as_str() {
                "--page" => {
                    page = value()?
                        .parse()
                        .map_err(|_| anyhow!("--page must be a positive number"))?;
                    if page == 0 {
                        bail!("--page must be a positive number");
                    }
                }
                "--search" => filter.title = Some(value()?),
                "--category" => {
                    let category: CourseCategory = value()?.parse().map_err(|e: String| anyhow!(e))?;
                    filter.category = Some(category.as_str().to_string());
                }
                "--level" => {
                    let level: CourseLevel = value()?.parse().map_err(|e: String| anyhow!(e))?;
                    filter.level = Some(level.as_str().to_string());
                }
                other => bail!("Unknown option for courses: {}", other),
            }
        }

        Ok(Command::Courses { page, filter })
    }

    /// The page this command stands for, if it is guarded.
    fn route(&self) -> Option<Route> {
        match self {
            Command::Login { .. } => Some(Route::Login),
            Command::Courses { .. } | Command::Show { .. } | Command::Delete { .. } => {
                Some(Route::Courses)
            }
            Command::Add => Some(Route::CourseAdd),
            Command::Edit { id } => Some(Route::CourseEdit(id.clone())),
            Command::Logout | Command::Status | Command::Help => None,
        }
    }
}

pub async fn run(
    command: Command,
    session: &SessionManager,
    courses: &CourseClient,
    config: &mut Config,
) -> Result<()> {
    if let Some(route) = command.route() {
        match RouteGuard::check(&route, &session.state()) {
            Access::Allow => {}
            Access::Loading => bail!("Session is still initializing"),
            Access::Redirect(Route::Login) => {
                bail!("Not logged in. Run `coursedesk login` first.")
            }
            Access::Redirect(_) => {
                let name = session
                    .current_user()
                    .map(|u| u.display_name())
                    .unwrap_or_default();
                println!(
                    "Already logged in as {}. Run `coursedesk logout` to switch accounts.",
                    name
                );
                return Ok(());
            }
        }
    }

    match command {
        Command::Login { email } => login(session, config, email).await,
        Command::Logout => {
            session.logout();
            println!("Logged out.");
            Ok(())
        }
        Command::Status => {
            status(session);
            Ok(())
        }
        Command::Courses { page, filter } => list_courses(courses, page, &filter).await,
        Command::Show { id } => show_course(courses, &id).await,
        Command::Add => add_course(courses).await,
        Command::Edit { id } => edit_course(courses, &id).await,
        Command::Delete { id, confirmed } => delete_course(courses, &id, confirmed).await,
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

async fn login(session: &SessionManager, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt::line("Email", config.last_identifier.as_deref())?,
    };
    let password = prompt::password("Password")?;

    validate_login_input(&email, &password).map_err(|e| anyhow!(e))?;

    println!("\nAuthenticating...");
    session.login(email.trim(), &password).await?;

    config.last_identifier = Some(email.trim().to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    let name = session
        .current_user()
        .map(|u| u.display_name())
        .unwrap_or_default();
    println!("Login successful! Welcome, {}.", name);
    Ok(())
}

fn status(session: &SessionManager) {
    let state = session.state();
    let Some(user) = state.current_user() else {
        println!("Not logged in.");
        return;
    };

    println!("Logged in as {} <{}>", user.display_name(), user.email);
    let expires_at = session
        .get_access_token()
        .and_then(|t| token::decode(&t).ok())
        .and_then(|claims| claims.expires_at_utc());
    match expires_at {
        Some(at) if session.is_token_expired() => {
            println!("Access token: expired at {} (refreshed on next request)", at)
        }
        Some(at) => println!("Access token: valid until {}", at),
        None => println!("Access token: missing (refreshed on next request)"),
    }
}

/// Turn a course service failure into the message shown to the user.
/// Session expiry is reported as-is.
fn describe(e: ApiError, context: &str) -> anyhow::Error {
    match e {
        ApiError::Session(auth) => anyhow!(auth),
        ApiError::InvalidInput(message) => anyhow!(message),
        other => anyhow!("{}: {}", context, other),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn category_label(value: &str) -> String {
    value
        .parse::<CourseCategory>()
        .map(|c| c.label().to_string())
        .unwrap_or_else(|_| value.to_string())
}

async fn list_courses(courses: &CourseClient, page: u32, filter: &CourseFilter) -> Result<()> {
    let result = courses
        .list(page, DEFAULT_PAGE_SIZE, filter)
        .await
        .map_err(|e| describe(e, "Failed to fetch courses"))?;

    if result.data.is_empty() {
        println!("No courses found.");
        return Ok(());
    }

    println!(
        "{:<6} {:<width$} {:<12} {}",
        "ID",
        "TITLE",
        "CATEGORY",
        "LEVEL",
        width = TITLE_WIDTH
    );
    for course in &result.data {
        println!(
            "{:<6} {:<width$} {:<12} {}",
            course.id,
            truncate(&course.title, TITLE_WIDTH),
            category_label(&course.category),
            course.level,
            width = TITLE_WIDTH
        );
    }

    let pages = result.total.div_ceil(DEFAULT_PAGE_SIZE as usize).max(1);
    println!("\nPage {} of {} ({} courses)", page, pages, result.total);
    Ok(())
}

async fn fetch_course(courses: &CourseClient, id: &str) -> Result<Course> {
    courses
        .get(id)
        .await
        .map_err(|e| describe(e, "Failed to load course"))?
        .ok_or_else(|| anyhow!("Course not found"))
}

async fn show_course(courses: &CourseClient, id: &str) -> Result<()> {
    let course = fetch_course(courses, id).await?;

    println!("{}", course.title);
    println!("  ID:        {}", course.id);
    println!("  Category:  {}", category_label(&course.category));
    println!("  Level:     {} ({})", course.level, course.level_color());
    println!("  Thumbnail: {}", course.thumbnail);
    if !course.description.is_empty() {
        println!("\n{}", course.description);
    }
    Ok(())
}

/// Prompt for every course field, offering `current` values as defaults.
fn prompt_draft(current: Option<&CourseDraft>) -> Result<CourseDraft> {
    let title = prompt::line("Title", current.map(|c| c.title.as_str()))?;
    let category: CourseCategory = prompt::choice(
        "Category",
        &CourseCategory::ALL,
        current.map(|c| c.category.as_str()),
    )?;
    let level: CourseLevel = prompt::choice(
        "Level",
        &CourseLevel::ALL,
        current.map(|c| c.level.as_str()),
    )?;
    let description = prompt::line("Description", current.map(|c| c.description.as_str()))?;
    let thumbnail = prompt::line("Thumbnail URL", current.map(|c| c.thumbnail.as_str()))?;

    Ok(CourseDraft {
        title,
        category: category.as_str().to_string(),
        level: level.as_str().to_string(),
        description,
        thumbnail,
    })
}

async fn add_course(courses: &CourseClient) -> Result<()> {
    let draft = prompt_draft(None)?;
    let course = courses
        .create(draft)
        .await
        .map_err(|e| describe(e, "Failed to create course"))?;
    println!("Course created successfully (id {}).", course.id);
    Ok(())
}

async fn edit_course(courses: &CourseClient, id: &str) -> Result<()> {
    let existing = fetch_course(courses, id).await?;
    let draft = prompt_draft(Some(&existing.to_draft()))?;

    courses
        .update(&Course::from_draft(existing.id, draft))
        .await
        .map_err(|e| describe(e, "Failed to update course"))?;
    println!("Course updated successfully.");
    Ok(())
}

async fn delete_course(courses: &CourseClient, id: &str, confirmed: bool) -> Result<()> {
    if !confirmed && !prompt::confirm(&format!("Delete course {}?", id))? {
        println!("Cancelled.");
        return Ok(());
    }

    courses
        .delete(id)
        .await
        .map_err(|e| describe(e, "Failed to delete course"))?;
    println!("Course deleted successfully.");
    Ok(())
}
