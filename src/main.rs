//! tutoria CLI entry point

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tutoria::{
    commands::{
        cmd_activity, cmd_add_course, cmd_add_group, cmd_add_topic, cmd_chat, cmd_course_stats,
        cmd_enroll, cmd_group_stats, cmd_ingest, cmd_init, cmd_list_topics, cmd_new_session,
        cmd_query, cmd_remove_file, cmd_reprocess, cmd_student_stats, cmd_top_topics,
        print_activity, print_aggregate_stats, print_exchange, print_process_outcome,
        print_query_results, print_student_stats, print_top_topics, print_topics,
    },
    config::Config,
    error::Result,
    store::{DateRange, Db},
};

#[derive(Parser)]
#[command(name = "tutoria")]
#[command(version, about = "Course knowledge-base RAG and topic analytics", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize tutoria configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Manage courses, groups, topics, and enrollments
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },

    /// Ingest a PDF into a course's knowledge base
    Ingest {
        /// Course to attach the file to
        #[arg(long)]
        course: i64,

        /// Path to the PDF file
        path: PathBuf,

        /// Display name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Re-run processing on a registered file
    Reprocess {
        /// Knowledge file ID
        file_id: i64,
    },

    /// Remove a knowledge file and its chunks
    Remove {
        /// Knowledge file ID
        file_id: i64,
    },

    /// Search a course's knowledge base
    Query {
        /// Course to search
        #[arg(long)]
        course: i64,

        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Start a new chat session
    NewSession {
        /// Student ID
        #[arg(long)]
        student: i64,

        /// Course the session belongs to
        #[arg(long)]
        course: Option<i64>,
    },

    /// Send a message into a chat session
    Chat {
        /// Session ID
        #[arg(long)]
        session: i64,

        /// The message text
        message: String,
    },

    /// Topic and activity statistics
    Stats {
        #[command(subcommand)]
        scope: StatsScope,
    },
}

#[derive(Subcommand)]
enum CourseAction {
    /// Create a course
    Add { name: String },

    /// Create a group within a course
    AddGroup {
        #[arg(long)]
        course: i64,
        name: String,
    },

    /// Create an active topic within a course
    AddTopic {
        #[arg(long)]
        course: i64,
        name: String,

        /// Topic description shown to the classifier
        #[arg(short, long)]
        description: Option<String>,

        /// Comma-separated keywords shown to the classifier
        #[arg(short, long)]
        keywords: Option<String>,
    },

    /// Enroll a student in a course
    Enroll {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        course: i64,
        #[arg(long)]
        group: Option<i64>,
    },

    /// List a course's active topics
    Topics {
        #[arg(long)]
        course: i64,
    },
}

#[derive(Subcommand)]
enum StatsScope {
    /// One student's topic breakdown in a course
    Student {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        course: i64,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Aggregate topic breakdown for a group
    Group {
        #[arg(long)]
        group: i64,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Aggregate topic breakdown for a course
    Course {
        #[arg(long)]
        course: i64,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Per-day activity totals for a course
    Activity {
        #[arg(long)]
        course: i64,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Most-discussed topics over a date range
    Top {
        #[arg(long)]
        course: i64,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Init doesn't need an existing config
    if let Commands::Init { force } = &cli.command {
        let path = cmd_init(cli.config.clone(), *force).await?;
        println!("✓ tutoria initialized");
        println!("  Config: {}", path.display());
        println!("\nNext steps:");
        println!("  1. Edit the config to point at your chat/embedding backends");
        println!("  2. Create a course: tutoria course add \"My Course\"");
        println!("  3. Ingest material: tutoria ingest --course 1 notes.pdf");
        return Ok(());
    }

    let config = Config::load_or_default(cli.config.as_deref())?;
    let db = Db::open(&config.db_path).await?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Course { action } => match action {
            CourseAction::Add { name } => {
                let course = cmd_add_course(&db, &name).await?;
                println!("✓ Course '{}' created (id {})", course.name, course.id);
            }
            CourseAction::AddGroup { course, name } => {
                let group = cmd_add_group(&db, course, &name).await?;
                println!("✓ Group '{}' created (id {})", group.name, group.id);
            }
            CourseAction::AddTopic {
                course,
                name,
                description,
                keywords,
            } => {
                let topic = cmd_add_topic(
                    &db,
                    course,
                    &name,
                    description.as_deref(),
                    keywords.as_deref(),
                )
                .await?;
                println!("✓ Topic '{}' created (id {})", topic.name, topic.id);
            }
            CourseAction::Enroll {
                student,
                course,
                group,
            } => {
                cmd_enroll(&db, student, course, group).await?;
                println!("✓ Student {} enrolled in course {}", student, course);
            }
            CourseAction::Topics { course } => {
                let topics = cmd_list_topics(&db, course).await?;
                if cli.json {
                    let names: Vec<_> = topics.iter().map(|t| (t.id, t.name.clone())).collect();
                    println!("{}", serde_json::to_string_pretty(&names)?);
                } else {
                    print_topics(&topics);
                }
            }
        },

        Commands::Ingest { course, path, name } => {
            let (file, outcome) = cmd_ingest(&config, &db, course, &path, name).await?;
            print_process_outcome(&file.name, &outcome);
        }

        Commands::Reprocess { file_id } => {
            let outcome = cmd_reprocess(&config, &db, file_id).await?;
            print_process_outcome(&format!("file {}", file_id), &outcome);
        }

        Commands::Remove { file_id } => {
            cmd_remove_file(&db, file_id).await?;
            println!("✓ Knowledge file {} removed", file_id);
        }

        Commands::Query {
            course,
            query,
            limit,
        } => {
            let result = cmd_query(&config, &db, course, &query, limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_query_results(&result);
            }
        }

        Commands::NewSession { student, course } => {
            let session = cmd_new_session(&db, student, course).await?;
            println!("✓ Session {} created for student {}", session.id, student);
        }

        Commands::Chat { session, message } => {
            let exchange = cmd_chat(&config, &db, session, &message).await?;
            print_exchange(&exchange);
        }

        Commands::Stats { scope } => match scope {
            StatsScope::Student {
                student,
                course,
                from,
                to,
            } => {
                let result =
                    cmd_student_stats(&config, &db, student, course, DateRange::new(from, to))
                        .await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    print_student_stats(&result);
                }
            }
            StatsScope::Group { group, from, to } => {
                let result = cmd_group_stats(&config, &db, group, DateRange::new(from, to)).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    print_aggregate_stats(&result);
                }
            }
            StatsScope::Course { course, from, to } => {
                let result =
                    cmd_course_stats(&config, &db, course, DateRange::new(from, to)).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    print_aggregate_stats(&result);
                }
            }
            StatsScope::Activity { course, from, to } => {
                let rows = cmd_activity(&config, &db, course, DateRange::new(from, to)).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    print_activity(&rows);
                }
            }
            StatsScope::Top { course, from, to } => {
                let rows = cmd_top_topics(&config, &db, course, from, to).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    print_top_topics(&rows);
                }
            }
        },
    }

    Ok(())
}
