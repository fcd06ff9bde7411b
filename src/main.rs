use std::sync::Arc;

use dotenv::dotenv;
use quiz_bot::config::Config;
use quiz_bot::keyboard::{self, CallbackAction};
use quiz_bot::quiz::{
    bank::QuestionBank,
    leaderboard,
    results::{JsonFileBackend, ResultsStore},
    session::{Answered, Selected, SessionError, SessionManager, Status, Step},
    Answer,
};
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::{MessageId, User},
    utils::command::BotCommands,
};

type QuizDialogue = Dialogue<ChatState, InMemStorage<ChatState>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default)]
pub enum ChatState {
    #[default]
    Idle,
    ReceiveName,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "start or resume the quiz.")]
    Start,
    #[command(description = "show the leaderboard.")]
    Leaders,
    #[command(description = "start over with a score of zero.")]
    Reset,
    #[command(description = "show this text.")]
    Help,
}

struct App {
    sessions: SessionManager,
    leaders_top_n: usize,
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine, the variables may come from the environment.
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    if let Err(err) = run().await {
        log::error!("Quiz bot stopped: {err}");
        std::process::exit(1);
    }
}

async fn run() -> HandlerResult {
    let config = Config::from_env()?;

    log::info!("Loading questions from {}", config.questions_file.display());
    let bank = QuestionBank::open(&config.questions_file)?;
    log::info!("{} questions loaded", bank.len());

    // Every run is a fresh tournament: results of the previous one are dropped.
    let store = ResultsStore::fresh(JsonFileBackend::new(&config.results_file))?;
    log::info!("Results reset at {}", config.results_file.display());

    let app = Arc::new(App {
        sessions: SessionManager::new(Arc::new(bank), Arc::new(store)),
        leaders_top_n: config.leaders_top_n,
    });

    let bot = Bot::new(config.token);

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<ChatState>, ChatState>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(dptree::case![ChatState::ReceiveName].endpoint(receive_name))
                .branch(dptree::endpoint(fallback)),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<ChatState>, ChatState>()
                .endpoint(handle_callback),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<ChatState>::new(), app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

const GREETING_TEXT: &str = "🎂 Hi! This is a quiz. Who knows the answers best? 🏆";
const ASK_NAME_TEXT: &str = "What's your name, hero? 😊";
const NAME_AS_TEXT: &str = "Please send your name as text";
const INVALID_CHOICE_TEXT: &str = "Invalid choice";
const STALE_TEXT: &str = "This question is no longer active";
const RETRY_TEXT: &str = "⚠️ Could not save your progress, please try again";

fn participant_id(user: &User) -> String {
    user.id.0.to_string()
}

async fn handle_command(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    cmd: Command,
    app: Arc<App>,
) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let id = participant_id(user);

    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, GREETING_TEXT)
                .reply_markup(keyboard::start_keyboard())
                .await?;
        }
        Command::Leaders => {
            bot.send_message(msg.chat.id, leaderboard_text(&app)).await?;
        }
        Command::Reset => match app.sessions.reset_self(&id, &user.full_name()) {
            Ok(step) => {
                dialogue.exit().await?;
                bot.send_message(msg.chat.id, "🔄 Progress reset, starting over!")
                    .await?;
                show_step(&bot, msg.chat.id, &app, &step).await?;
            }
            Err(err) => {
                log::warn!("Reset for participant {id} failed: {err}");
                bot.send_message(msg.chat.id, error_text(&err)).await?;
            }
        },
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
    }
    Ok(())
}

async fn receive_name(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    app: Arc<App>,
) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let name = match msg.text().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            bot.send_message(msg.chat.id, NAME_AS_TEXT).await?;
            return Ok(());
        }
    };

    let id = participant_id(user);
    match app.sessions.begin(&id, &name) {
        Ok(step) => {
            dialogue.exit().await?;
            bot.send_message(msg.chat.id, format!("Great, {name}! Let's go 🚀"))
                .await?;
            show_step(&bot, msg.chat.id, &app, &step).await?;
        }
        Err(err) => {
            log::warn!("Begin for participant {id} failed: {err}");
            bot.send_message(msg.chat.id, error_text(&err)).await?;
        }
    }
    Ok(())
}

async fn fallback(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Press /start to play or /help for commands")
        .await?;
    Ok(())
}

async fn handle_callback(
    bot: Bot,
    dialogue: QuizDialogue,
    q: CallbackQuery,
    app: Arc<App>,
) -> HandlerResult {
    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let chat_id = message.chat.id;
    let id = participant_id(&q.from);

    let Some(action) = CallbackAction::parse(data) else {
        log::warn!("Unknown callback data {data:?} from participant {id}");
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let result = match action {
        CallbackAction::StartQuiz => {
            bot.answer_callback_query(q.id.clone()).await?;
            return start_quiz(&bot, &dialogue, chat_id, &q.from, &app).await;
        }
        CallbackAction::Single { question, option } => app
            .sessions
            .submit_at(&id, question, Answer::Single(option))
            .map(Selected::Answered),
        CallbackAction::Toggle { question, option } => app
            .sessions
            .toggle_option_at(&id, question, option)
            .map(Selected::Toggled),
        CallbackAction::Done { question } => app
            .sessions
            .submit_selected_at(&id, question)
            .map(Selected::Answered),
    };

    match result {
        Ok(Selected::Toggled(step)) => {
            bot.answer_callback_query(q.id.clone()).await?;
            edit_keyboard(&bot, chat_id, message.id, &app, &step).await?;
        }
        Ok(Selected::Answered(Answered { next, .. })) => {
            bot.answer_callback_query(q.id.clone()).await?;
            show_step(&bot, chat_id, &app, &next).await?;
        }
        Err(err) => {
            log::warn!("Callback {data:?} from participant {id} rejected: {err}");
            bot.answer_callback_query(q.id.clone())
                .text(error_text(&err))
                .await?;
        }
    }
    Ok(())
}

/// Unknown participants are asked for a name first; known ones resume where
/// they stopped and keep the name they gave.
async fn start_quiz(
    bot: &Bot,
    dialogue: &QuizDialogue,
    chat_id: ChatId,
    user: &User,
    app: &App,
) -> HandlerResult {
    let id = participant_id(user);
    if app.sessions.status(&id) == Status::NotStarted {
        dialogue.update(ChatState::ReceiveName).await?;
        bot.send_message(chat_id, ASK_NAME_TEXT).await?;
        return Ok(());
    }

    match app.sessions.begin(&id, &user.full_name()) {
        Ok(step) => show_step(bot, chat_id, app, &step).await,
        Err(err) => {
            log::warn!("Resume for participant {id} failed: {err}");
            bot.send_message(chat_id, error_text(&err)).await?;
            Ok(())
        }
    }
}

async fn show_step(bot: &Bot, chat_id: ChatId, app: &App, step: &Step) -> HandlerResult {
    let bank = app.sessions.bank();
    match step {
        Step::Ask { index, selected } => {
            let question = bank.get(*index)?;
            bot.send_message(chat_id, keyboard::question_text(question, bank.len()))
                .reply_markup(keyboard::question_keyboard(question, selected))
                .await?;
        }
        Step::Finished { score } => {
            let text = format!(
                "✅ Quiz finished!\nYou scored {}/{}.\n\n{}",
                score,
                bank.max_score(),
                leaderboard_text(app)
            );
            bot.send_message(chat_id, text).await?;
        }
    }
    Ok(())
}

async fn edit_keyboard(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    app: &App,
    step: &Step,
) -> HandlerResult {
    if let Step::Ask { index, selected } = step {
        let question = app.sessions.bank().get(*index)?;
        bot.edit_message_reply_markup(chat_id, message_id)
            .reply_markup(keyboard::question_keyboard(question, selected))
            .await?;
    }
    Ok(())
}

fn leaderboard_text(app: &App) -> String {
    let entries = leaderboard::top(app.sessions.store(), app.leaders_top_n);
    leaderboard::render(&entries, app.sessions.bank().max_score())
}

fn error_text(err: &SessionError) -> &'static str {
    if err.is_user_error() {
        INVALID_CHOICE_TEXT
    } else if err.is_retryable() {
        RETRY_TEXT
    } else {
        STALE_TEXT
    }
}
