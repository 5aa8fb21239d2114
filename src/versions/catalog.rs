// src/versions/catalog.rs

use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// How a tool's presence and version are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Run `program args...` and read its output.
    Command(&'static str, &'static [&'static str]),
    /// Look for a WAMP Server installation directory.
    Wamp,
    /// Look for an XAMPP installation directory.
    Xampp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub category: &'static str,
    pub probe: Probe,
}

const fn tool(
    category: &'static str,
    name: &'static str,
    program: &'static str,
    args: &'static [&'static str],
) -> ToolSpec {
    ToolSpec {
        name,
        category,
        probe: Probe::Command(program, args),
    }
}

const VERSION: &[&str] = &["--version"];

/// Every probed tool in display order.
pub const TOOLS: &[ToolSpec] = &[
    tool("Languages", "Python", "python", VERSION),
    tool("Languages", "Node.js", "node", VERSION),
    tool("Languages", "PHP", "php", VERSION),
    tool("Languages", "Java", "java", VERSION),
    tool("Languages", "Go", "go", &["version"]),
    tool("Languages", "Rust", "rustc", VERSION),
    tool("Languages", "Ruby", "ruby", VERSION),
    tool("Languages", "C# (dotnet)", "dotnet", VERSION),
    tool("Package Managers", "npm", "npm", VERSION),
    tool("Package Managers", "pip", "pip", VERSION),
    tool("Package Managers", "Composer", "composer", VERSION),
    tool("Package Managers", "Yarn", "yarn", VERSION),
    tool("Package Managers", "pnpm", "pnpm", VERSION),
    tool("Package Managers", "Cargo", "cargo", VERSION),
    tool("Package Managers", "gem", "gem", VERSION),
    tool("Package Managers", "Maven", "mvn", VERSION),
    tool("Package Managers", "Gradle", "gradle", VERSION),
    tool("Frontend Tools", "Vue CLI", "vue", VERSION),
    tool("Frontend Tools", "Angular CLI", "ng", VERSION),
    tool("Frontend Tools", "Vite", "vite", VERSION),
    tool("Frontend Tools", "Webpack", "webpack", VERSION),
    tool("Frontend Tools", "TypeScript", "tsc", VERSION),
    tool("Version Control", "Git", "git", VERSION),
    tool("Version Control", "SVN", "svn", VERSION),
    tool("Databases", "MySQL", "mysql", VERSION),
    tool("Databases", "PostgreSQL", "psql", VERSION),
    tool("Databases", "MongoDB", "mongo", VERSION),
    tool("Databases", "SQLite", "sqlite3", VERSION),
    tool("Development Tools", "Docker", "docker", VERSION),
    tool("Development Tools", "Docker Compose", "docker-compose", VERSION),
    tool("Development Tools", "VS Code", "code", VERSION),
    tool("Development Tools", "Cursor", "cursor", VERSION),
    tool("Development Tools", "Windsurf", "windsurf", VERSION),
    tool("Development Tools", "Postman", "postman", VERSION),
    ToolSpec {
        name: "WAMP Server",
        category: "Development Environments",
        probe: Probe::Wamp,
    },
    ToolSpec {
        name: "XAMPP",
        category: "Development Environments",
        probe: Probe::Xampp,
    },
    tool("Cloud Tools", "AWS CLI", "aws", VERSION),
    tool("Cloud Tools", "Azure CLI", "az", VERSION),
    tool("Cloud Tools", "Google Cloud SDK", "gcloud", VERSION),
    tool("Cloud Tools", "Heroku CLI", "heroku", VERSION),
];

/// Package identifiers for tools that can be installed automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallSpec {
    pub winget: Option<&'static str>,
    pub npm: Option<&'static str>,
    pub chocolatey: Option<&'static str>,
    pub description: &'static str,
}

pub static INSTALLABLE: Lazy<IndexMap<&'static str, InstallSpec>> = Lazy::new(|| {
    let native = |winget, chocolatey, description| InstallSpec {
        winget: Some(winget),
        npm: None,
        chocolatey: Some(chocolatey),
        description,
    };
    let npm = |package, description| InstallSpec {
        winget: None,
        npm: Some(package),
        chocolatey: None,
        description,
    };

    IndexMap::from([
        ("Python", native("Python.Python.3.12", "python", "Python programming language")),
        ("Node.js", native("OpenJS.NodeJS", "nodejs", "Node.js JavaScript runtime")),
        ("Go", native("GoLang.Go", "golang", "Go programming language")),
        ("Rust", native("Rustlang.Rustup", "rust", "Rust programming language")),
        ("Git", native("Git.Git", "git", "Git version control system")),
        (
            "Docker",
            native("Docker.DockerDesktop", "docker-desktop", "Docker containerization platform"),
        ),
        ("Yarn", npm("yarn", "Yarn package manager")),
        ("pnpm", npm("pnpm", "pnpm package manager")),
        ("Vue CLI", npm("@vue/cli", "Vue.js command line interface")),
        ("Angular CLI", npm("@angular/cli", "Angular command line interface")),
        ("TypeScript", npm("typescript", "TypeScript programming language")),
    ])
});

/// Looks up a tool by case-insensitive name.
pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}

/// Looks up an installable tool by case-insensitive name.
pub fn find_installable(name: &str) -> Option<(&'static str, &'static InstallSpec)> {
    INSTALLABLE
        .iter()
        .find(|(tool, _)| tool.eq_ignore_ascii_case(name))
        .map(|(tool, spec)| (*tool, spec))
}

/// Category names in display order.
pub fn categories() -> Vec<&'static str> {
    let mut seen: Vec<&'static str> = Vec::new();
    for tool in TOOLS {
        if !seen.contains(&tool.category) {
            seen.push(tool.category);
        }
    }
    seen
}
