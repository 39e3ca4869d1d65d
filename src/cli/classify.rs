use std::fs;
use std::io::{self, Read};

use crate::verify::{classify, extract};

pub fn run_classify(file: Option<String>, packets: bool) -> anyhow::Result<()> {
    let transcript = match file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    println!("{}", classify(Some(&transcript)));
    if packets {
        println!("{}", serde_json::to_string_pretty(&extract(&transcript))?);
    }
    Ok(())
}
