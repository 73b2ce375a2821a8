mod blpop;
mod command_error;
mod command_handler;
mod config_get;
mod del;
mod echo;
mod geoadd;
mod geodist;
mod geopos;
mod geosearch;
mod get;
mod incr;
mod info;
mod keys;
mod llen;
mod lpop;
mod lrange;
mod ping;
mod psync;
mod pub_sub;
mod replconf;
mod rpush_and_lpush;
mod set;
mod stream_utils;
mod type_command;
mod wait;
mod xadd;
mod xrange;
mod xread;
mod zadd;
mod zcard;
mod zrange;
mod zrank;
mod zrem;
mod zscore;
mod zset_utils;

pub use command_error::CommandError;
pub use command_handler::{
    CommandHandler, CommandOutcome, CommandSource, ExecutionContext, WRITE_COMMANDS,
};
