mod config;
mod conversation;
mod pacing;
mod quiz;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use config::{Backend, Config};
use conversation::{
    route_text, Command, QuizService, State, TextAction, ASK_TOPIC_TEXT, CANCELED_TEXT,
    EMPTY_TOPIC_TEXT, NOTHING_TO_CANCEL_TEXT, USE_START_TEXT,
};
use dotenv::dotenv;
use quiz::{
    dispatch::ChatTarget,
    gemini::GeminiClient,
    generator::{QuizGenerator, TextGenerator},
    openai::ChatGptClient,
};
use teloxide::{
    dispatching::{dialogue::InMemStorage, UpdateHandler},
    prelude::*,
    utils::command::BotCommands,
    RequestError,
};

type QuizDialogue = Dialogue<State, InMemStorage<State>>;
type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), HandlerError>;

#[tokio::main]
async fn main() -> HandlerResult {
    // A missing .env is fine when the variables come from the environment.
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    let config = Config::from_env()?;

    let backend: Box<dyn TextGenerator> = match &config.backend {
        Backend::Gemini {
            api_key,
            model,
            base_url,
        } => {
            log::info!("Generating questions with Gemini model {}", model);
            Box::new(GeminiClient::new(
                base_url.as_str(),
                model.as_str(),
                api_key.as_str(),
                config.generation_timeout,
            )?)
        }
        Backend::ChatGpt { api_key } => {
            log::info!("Generating questions with ChatGPT");
            Box::new(ChatGptClient::new(api_key, config.generation_timeout)?)
        }
    };

    let bot = Bot::new(&config.telegram_token);

    let me = bot.get_me().await?;
    let bot_username = me
        .user
        .username
        .clone()
        .ok_or("the bot account has no username")?;
    log::info!("Logged in as @{}", bot_username);

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Could not register the command list: {}", err);
    }

    let service = Arc::new(QuizService::new(
        QuizGenerator::new(backend, config.prompt.clone()),
        config.explanations,
        config.dispatch.clone(),
        bot_username,
    ));

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![InMemStorage::<State>::new(), service])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn schema() -> UpdateHandler<HandlerError> {
    let commands = dptree::entry()
        .filter_command::<Command>()
        .branch(dptree::case![Command::Start].endpoint(start))
        .branch(dptree::case![Command::Cancel].endpoint(cancel))
        .branch(dptree::case![Command::Help].endpoint(help));

    Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(commands)
        .branch(dptree::endpoint(receive_text))
}

async fn reply(bot: &Bot, msg: &Message, text: &str) -> Result<Message, RequestError> {
    bot.send_message(msg.chat.id, text)
        .reply_to_message_id(msg.id)
        .await
}

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    reply(&bot, &msg, ASK_TOPIC_TEXT).await?;

    dialogue.update(State::AwaitingTopic).await?;
    Ok(())
}

async fn cancel(bot: Bot, dialogue: QuizDialogue, state: State, msg: Message) -> HandlerResult {
    let text = match state {
        State::Idle => NOTHING_TO_CANCEL_TEXT,
        State::AwaitingTopic => CANCELED_TEXT,
    };
    reply(&bot, &msg, text).await?;

    dialogue.exit().await?;
    Ok(())
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    reply(&bot, &msg, &Command::descriptions().to_string()).await?;
    Ok(())
}

async fn receive_text(
    service: Arc<QuizService>,
    bot: Bot,
    dialogue: QuizDialogue,
    state: State,
    msg: Message,
) -> HandlerResult {
    let target = ChatTarget::from_message(&msg);

    let Some(text) = msg.text() else {
        // Stickers, photos and the like only get an answer in private chats
        // that are waiting for a topic.
        if state == State::AwaitingTopic && !target.is_group {
            reply(&bot, &msg, EMPTY_TOPIC_TEXT).await?;
        }
        return Ok(());
    };

    match route_text(&state, text, target.is_group, service.bot_username()) {
        TextAction::Ignore => {}
        TextAction::RemindStart => {
            reply(&bot, &msg, USE_START_TEXT).await?;
        }
        TextAction::AskAgain => {
            reply(&bot, &msg, EMPTY_TOPIC_TEXT).await?;
        }
        TextAction::Topic(topic) => {
            log::info!("Quiz requested in {} on {:?}", target.chat_id, topic);
            let outcome = service.run(&bot, &target, &topic).await;

            dialogue.exit().await?;
            log::info!("Quiz in {} ended: {:?}", target.chat_id, outcome?);
        }
    }
    Ok(())
}
