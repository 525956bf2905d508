use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ServeArgs;

#[derive(Parser)]
#[command(name = "pagesmith")]
#[command(about = "PDF and image conversion tools over HTTP, MCP and the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Run as MCP server over stdio
    Mcp,

    /// Copy selected pages into a new PDF
    #[command(alias = "extract")]
    Split {
        /// PDF file to take pages from
        path: PathBuf,

        /// Page ranges (e.g., "1-5,10")
        pages: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Combine multiple PDFs into one
    Merge {
        /// PDF files to merge, in order
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Strip metadata and recompress a PDF
    Compress {
        /// PDF file to compress
        path: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Resize an image to exact dimensions (PNG output)
    Resize {
        /// Image file
        path: PathBuf,

        #[arg(long)]
        width: u32,

        #[arg(long)]
        height: u32,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert an image to PNG, JPG, WebP or GIF
    Convert {
        /// Image file
        path: PathBuf,

        /// Target format
        #[arg(short, long, default_value = "png")]
        format: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build a PDF with one page per image
    ImagesToPdf {
        /// Image files, in page order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}
