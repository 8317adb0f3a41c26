use anyhow::Context;
use klatsch_client::{
    api::{CommentId, Credentials, NewPost, PostId, ProfilePatch, UserId},
    remote, ClientDb, CommentNode, Relation,
};
use klatsch_http::{AutoRefresh, HttpBackend};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Show who the credentials belong to
    Whoami,

    /// Print the home feed
    Feed {
        /// How many pages to load
        #[structopt(long, default_value = "1")]
        pages: u32,
    },

    /// Print a post with its full comment tree
    Thread {
        /// Post id
        post: String,
    },

    /// Create a post
    Post {
        /// Post title
        title: String,

        /// Post body
        content: String,
    },

    /// Comment on a post
    Comment {
        /// Post id
        post: String,

        /// Comment text
        content: String,
    },

    /// Reply to a comment
    Reply {
        /// Post id
        post: String,

        /// Comment id to reply under
        parent: String,

        /// Reply text
        content: String,
    },

    /// Edit one of your comments
    Edit {
        /// Post id
        post: String,

        /// Comment id
        comment: String,

        /// Replacement text
        content: String,
    },

    /// Show a user's profile
    Profile {
        /// User id
        user: String,
    },

    /// Update your own bio
    SetBio {
        /// New bio text
        bio: String,
    },
}

fn credentials() -> anyhow::Result<Credentials> {
    Ok(Credentials {
        username: std::env::var("KLATSCH_USER")
            .context("retrieving KLATSCH_USER environment variable")?,
        password: std::env::var("KLATSCH_PASSWORD")
            .context("retrieving KLATSCH_PASSWORD environment variable")?,
    })
}

fn print_forest(db: &ClientDb, nodes: &[CommentNode], depth: usize) {
    for n in nodes {
        println!(
            "{:indent$}[{}] {}: {}",
            "",
            n.comment.id,
            db.display_name(&n.comment.author_id),
            n.comment.content,
            indent = depth * 2
        );
        print_forest(db, &n.children, depth + 1);
    }
}

/// Expands every node until the whole forest is loaded.
async fn expand_all(
    db: &mut ClientDb,
    backend: &AutoRefresh<HttpBackend>,
    post: &PostId,
) -> anyhow::Result<()> {
    loop {
        let tree = db.thread(post).context("thread is not open")?;
        let view = db.view(post).context("thread is not open")?;
        let pending: Vec<CommentId> = tree
            .comments()
            .into_iter()
            .map(|c| c.id.clone())
            .filter(|id| !view.replies_fetched(id))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        for id in pending {
            remote::expand_replies(db, backend, post, &id).await?;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let backend = AutoRefresh::new(HttpBackend::log_in(opt.host, &credentials()?).await?);
    let mut db = remote::boot(&backend).await?;

    match opt.cmd {
        Command::Whoami => {
            println!("{} (@{}, {})", db.me.display_name, db.me.username, db.me.id);
            if let Some(bio) = &db.me.bio {
                println!("{bio}");
            }
        }

        Command::Feed { pages } => {
            for _ in 0..pages {
                remote::load_next_feed_page(&mut db, &backend).await?;
            }
            for post in db.feed.posts() {
                println!(
                    "[{}] {} by {} ({} comments)",
                    post.id,
                    post.title,
                    db.display_name(&post.author_id),
                    post.comment_count
                );
            }
            if db.feed.exhausted() {
                println!("(end of feed)");
            }
        }

        Command::Thread { post } => {
            let post = PostId(post);
            remote::open_thread(&mut db, &backend, post.clone()).await?;
            expand_all(&mut db, &backend, &post).await?;
            let record = db.post(&post).context("post is not in the local db")?;
            println!(
                "{} by {}\n{}\n",
                record.title,
                db.display_name(&record.author_id),
                record.content
            );
            let tree = db.thread(&post).context("thread is not open")?;
            print_forest(&db, tree.roots(), 0);
        }

        Command::Post { title, content } => {
            let id = remote::create_post(&mut db, &backend, NewPost { title, content }).await?;
            println!("created post {id}");
        }

        Command::Comment { post, content } => {
            let post = PostId(post);
            remote::open_thread(&mut db, &backend, post.clone()).await?;
            let id = remote::submit_root_comment(&mut db, &backend, &post, &content).await?;
            println!("created comment {id}");
        }

        Command::Reply {
            post,
            parent,
            content,
        } => {
            let post = PostId(post);
            remote::open_thread(&mut db, &backend, post.clone()).await?;
            let id =
                remote::submit_reply(&mut db, &backend, &post, &CommentId(parent), &content)
                    .await?;
            println!("created reply {id}");
        }

        Command::Edit {
            post,
            comment,
            content,
        } => {
            let post = PostId(post);
            remote::open_thread(&mut db, &backend, post.clone()).await?;
            remote::submit_edit(&mut db, &backend, &post, &CommentId(comment), &content).await?;
            println!("updated comment");
        }

        Command::Profile { user } => {
            let profile = remote::open_profile(&mut db, &backend, UserId(user)).await?;
            println!("{} (@{})", profile.user.display_name, profile.user.username);
            if let Some(bio) = &profile.user.bio {
                println!("{bio}");
            }
            let relation = match profile.relation_to(&db.me.id) {
                Relation::Myself => "this is you",
                Relation::Stranger => "not friends",
                Relation::RequestSent => "friend request sent",
                Relation::RequestReceived => "sent you a friend request",
                Relation::Friends => "friends",
            };
            println!("{relation}; {} posts", profile.posts.len());
            for friend in &profile.friends {
                println!("  friends with {}", friend.display_name);
            }
        }

        Command::SetBio { bio } => {
            remote::update_my_profile(
                &mut db,
                &backend,
                ProfilePatch {
                    bio: Some(bio),
                    avatar: None,
                },
            )
            .await?;
            println!("bio updated");
        }
    }

    Ok(())
}
