// 🎓 course-store - command line front end for the course store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use course_store::{import_courses, CourseManager, Semester, Serializable, StoreConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "course-store")]
#[command(about = "Course and project store backed by SQLite", long_about = None)]
struct Args {
    /// Database path (SQLite file, or :memory:)
    #[arg(short, long, default_value = "courses.db")]
    db: PathBuf,

    /// Disable write-ahead logging
    #[arg(long)]
    no_wal: bool,

    /// Do not create the default admin user on an empty store
    #[arg(long)]
    no_seed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the schema (and the admin user) and exit
    Init,

    /// Create a course, or update it if the name exists with the same semester
    CreateCourse { name: String, semester: String },

    /// List all courses
    List,

    /// Print one course with projects and schedule as JSON
    Show { id: i64 },

    /// Add a project to a course
    AddProject { course_id: i64, name: String },

    /// Import courses from a `courseName,semester` CSV file
    Import { csv: PathBuf },

    /// Normalize a semester spelling without touching the store
    ParseSemester { text: String },
}

/// `RUST_LOG` directives when set and valid, `info` otherwise
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let args = Args::parse();

    if let Commands::ParseSemester { text } = &args.command {
        let semester = Semester::parse(text)?;
        println!("{}", semester);
        return Ok(());
    }

    let config = StoreConfig::builder()
        .database_path(args.db.clone())
        .journal_wal(!args.no_wal)
        .seed_admin(!args.no_seed)
        .build();
    let conn = config
        .open()
        .with_context(|| format!("Failed to open store at {}", args.db.display()))?;
    let manager = CourseManager::with_global_registry(&conn);

    match args.command {
        Commands::Init => {
            println!("✓ Store ready at {}", args.db.display());
        }
        Commands::CreateCourse { name, semester } => {
            let course = manager.create_course(&name, &semester)?;
            println!(
                "✓ Course #{} {} ({})",
                course.id().unwrap_or_default(),
                name,
                course.semester().map(ToString::to_string).unwrap_or_default()
            );
        }
        Commands::List => {
            let courses = manager.all_courses()?;
            if courses.is_empty() {
                println!("No courses yet");
            }
            for course in courses {
                println!(
                    "{:>4}  {:<40} {:<16} {} projects",
                    course.id().unwrap_or_default(),
                    course.name().unwrap_or("-"),
                    course.semester().map(ToString::to_string).unwrap_or_default(),
                    course.projects().len()
                );
            }
        }
        Commands::Show { id } => match manager.find_course(id)? {
            Some(course) => println!("{}", serde_json::to_string_pretty(&course)?),
            None => {
                eprintln!("❌ No course with id {}", id);
                std::process::exit(1);
            }
        },
        Commands::AddProject { course_id, name } => match manager.add_project(course_id, &name)? {
            Some(project) => println!(
                "✓ Project #{} {} added to course #{}",
                project.id().unwrap_or_default(),
                name,
                course_id
            ),
            None => {
                eprintln!("❌ No course with id {}", course_id);
                std::process::exit(1);
            }
        },
        Commands::Import { csv } => {
            let summary = import_courses(&manager, &csv)?;
            println!("✓ Imported {} of {} courses", summary.created, summary.total());
            for row in &summary.rejected {
                println!("  ✗ line {}: {} ({})", row.line, row.course_name, row.reason);
            }
        }
        Commands::ParseSemester { .. } => {}
    }

    Ok(())
}
