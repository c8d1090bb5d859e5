//! Demo data set.

use chrono::NaiveDate;
use rusqlite::Connection;
use taskhub_core::ids::{ProjectId, UserId};
use taskhub_core::models::{
    NewProject, NewTask, NewUser, ProjectStatus, TaskPriority, TaskStatus, User, UserRole,
};
use taskhub_store::{ProjectRepo, StoreError, TaskRepo, UserRepo};
use thiserror::Error;
use tracing::info;

use crate::auth::{AuthError, hash_password};

/// Seeding failure.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Database write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Password hashing failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Rows inserted by one seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Users inserted.
    pub users: usize,
    /// Projects inserted.
    pub projects: usize,
    /// Tasks inserted.
    pub tasks: usize,
}

const USERS: &[(&str, &str, &str, UserRole)] = &[
    ("admin@taskmanager.com", "admin123", "Admin User", UserRole::Admin),
    ("manager@taskmanager.com", "manager123", "Project Manager", UserRole::Manager),
    ("user@taskmanager.com", "user123", "Regular User", UserRole::User),
    ("john.doe@taskmanager.com", "john123", "John Doe", UserRole::User),
    ("jane.smith@taskmanager.com", "jane123", "Jane Smith", UserRole::Manager),
];

type Ymd = (i32, u32, u32);

struct ProjectSeed {
    name: &'static str,
    description: &'static str,
    status: ProjectStatus,
    start: Ymd,
    end: Ymd,
    owner: UserRole,
}

const PROJECTS: &[ProjectSeed] = &[
    ProjectSeed {
        name: "Website Redesign",
        description: "Complete redesign of company website with modern UI/UX",
        status: ProjectStatus::Active,
        start: (2024, 1, 15),
        end: (2024, 6, 30),
        owner: UserRole::Manager,
    },
    ProjectSeed {
        name: "Mobile App Development",
        description: "iOS and Android app for customer engagement",
        status: ProjectStatus::Active,
        start: (2024, 2, 1),
        end: (2024, 12, 31),
        owner: UserRole::Admin,
    },
    ProjectSeed {
        name: "Database Migration",
        description: "Migrate from legacy system to new cloud database",
        status: ProjectStatus::Active,
        start: (2024, 1, 1),
        end: (2024, 3, 31),
        owner: UserRole::Manager,
    },
    ProjectSeed {
        name: "Marketing Campaign",
        description: "Q2 marketing campaign for new product launch",
        status: ProjectStatus::Active,
        start: (2024, 4, 1),
        end: (2024, 6, 30),
        owner: UserRole::User,
    },
    ProjectSeed {
        name: "Security Audit",
        description: "Comprehensive security audit and penetration testing",
        status: ProjectStatus::Archived,
        start: (2023, 10, 1),
        end: (2023, 12, 31),
        owner: UserRole::Admin,
    },
];

struct TaskSeed {
    title: &'static str,
    description: &'static str,
    priority: TaskPriority,
    status: TaskStatus,
    project: &'static str,
    assignee: UserRole,
    due: Ymd,
}

const TASKS: &[TaskSeed] = &[
    TaskSeed {
        title: "Design Homepage Layout",
        description: "Create wireframes and mockups for homepage redesign",
        priority: TaskPriority::High,
        status: TaskStatus::Pending,
        project: "Website Redesign",
        assignee: UserRole::Manager,
        due: (2024, 3, 15),
    },
    TaskSeed {
        title: "Implement Responsive Design",
        description: "Ensure website works on all device sizes",
        priority: TaskPriority::High,
        status: TaskStatus::Pending,
        project: "Website Redesign",
        assignee: UserRole::User,
        due: (2024, 4, 30),
    },
    TaskSeed {
        title: "Content Migration",
        description: "Move existing content to new design structure",
        priority: TaskPriority::Medium,
        status: TaskStatus::Pending,
        project: "Website Redesign",
        assignee: UserRole::User,
        due: (2024, 5, 15),
    },
    TaskSeed {
        title: "Setup Development Environment",
        description: "Configure React Native development setup",
        priority: TaskPriority::High,
        status: TaskStatus::Done,
        project: "Mobile App Development",
        assignee: UserRole::Admin,
        due: (2024, 2, 15),
    },
    TaskSeed {
        title: "Design App UI/UX",
        description: "Create app design mockups and user flows",
        priority: TaskPriority::High,
        status: TaskStatus::Pending,
        project: "Mobile App Development",
        assignee: UserRole::Manager,
        due: (2024, 4, 30),
    },
    TaskSeed {
        title: "Implement Authentication",
        description: "Add user login and registration functionality",
        priority: TaskPriority::High,
        status: TaskStatus::Pending,
        project: "Mobile App Development",
        assignee: UserRole::User,
        due: (2024, 6, 30),
    },
    TaskSeed {
        title: "Backup Existing Data",
        description: "Create full backup of current database",
        priority: TaskPriority::High,
        status: TaskStatus::Done,
        project: "Database Migration",
        assignee: UserRole::Admin,
        due: (2024, 1, 15),
    },
    TaskSeed {
        title: "Test Migration Scripts",
        description: "Validate data migration in staging environment",
        priority: TaskPriority::High,
        status: TaskStatus::Pending,
        project: "Database Migration",
        assignee: UserRole::Manager,
        due: (2024, 2, 28),
    },
    TaskSeed {
        title: "Create Campaign Strategy",
        description: "Develop comprehensive marketing strategy document",
        priority: TaskPriority::Medium,
        status: TaskStatus::Pending,
        project: "Marketing Campaign",
        assignee: UserRole::User,
        due: (2024, 4, 15),
    },
    TaskSeed {
        title: "Design Marketing Materials",
        description: "Create banners, social media posts, and email templates",
        priority: TaskPriority::Medium,
        status: TaskStatus::Pending,
        project: "Marketing Campaign",
        assignee: UserRole::User,
        due: (2024, 5, 15),
    },
];

fn date((y, m, d): Ymd) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn first_with_role(users: &[User], role: UserRole) -> Option<UserId> {
    users.iter().find(|u| u.role == role).map(|u| u.id.clone())
}

/// Seed the demo data with Argon2 password hashes.
pub fn seed_demo_data(conn: &Connection) -> Result<SeedReport, SeedError> {
    seed_with_hasher(conn, hash_password)
}

/// Seed the demo data set. Each table is skipped if it already has rows.
///
/// Projects need users and tasks need projects; a dependent table is
/// skipped when its parents are empty.
pub fn seed_with_hasher<H>(conn: &Connection, hasher: H) -> Result<SeedReport, SeedError>
where
    H: Fn(&str) -> Result<String, AuthError>,
{
    let mut report = SeedReport::default();

    if UserRepo::count(conn)? == 0 {
        for (email, password, name, role) in USERS {
            let input = NewUser {
                email: (*email).to_owned(),
                password: (*password).to_owned(),
                name: (*name).to_owned(),
                role: Some(*role),
                avatar: None,
            };
            let _ = UserRepo::insert(conn, &input, &hasher(*password)?)?;
            report.users += 1;
        }
        info!(count = report.users, "seeded users");
    } else {
        info!("users already seeded, skipping");
    }

    let users = UserRepo::list(conn)?;
    if users.is_empty() {
        info!("no users found, skipping project and task seeding");
        return Ok(report);
    }

    if ProjectRepo::count(conn)? == 0 {
        for seed in PROJECTS {
            let input = NewProject {
                name: seed.name.to_owned(),
                description: Some(seed.description.to_owned()),
                status: Some(seed.status),
                start_date: date(seed.start),
                end_date: date(seed.end),
                owner_id: first_with_role(&users, seed.owner),
            };
            let _ = ProjectRepo::insert(conn, &input)?;
            report.projects += 1;
        }
        info!(count = report.projects, "seeded projects");
    } else {
        info!("projects already seeded, skipping");
    }

    let projects = ProjectRepo::list(conn)?;
    if projects.is_empty() {
        info!("no projects found, skipping task seeding");
        return Ok(report);
    }
    let project_id = |name: &str| -> Option<ProjectId> {
        projects.iter().find(|p| p.name == name).map(|p| p.id.clone())
    };

    if TaskRepo::count(conn)? == 0 {
        for seed in TASKS {
            let input = NewTask {
                title: seed.title.to_owned(),
                description: Some(seed.description.to_owned()),
                priority: Some(seed.priority),
                status: Some(seed.status),
                project_id: project_id(seed.project),
                assigned_to: first_with_role(&users, seed.assignee),
                due_date: date(seed.due),
            };
            let _ = TaskRepo::insert(conn, &input)?;
            report.tasks += 1;
        }
        info!(count = report.tasks, "seeded tasks");
    } else {
        info!("tasks already seeded, skipping");
    }

    Ok(report)
}
